// ==========================================
// UPH 引擎 - API 层
// ==========================================
// 职责: 对外查询 / 触发接口，供 CLI 及上层应用调用
// ==========================================

pub mod error;
pub mod import_api;
pub mod performance_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use import_api::ImportApi;
pub use performance_api::{PerformanceApi, PerformancePage};
