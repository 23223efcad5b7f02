// ==========================================
// UPH 引擎 - 数据仓储层
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// 红线: Repository 不含业务逻辑
// ==========================================

pub mod error;
pub mod performance_repo;
pub mod recalc_run_repo;
pub mod work_cycle_import_repo;
pub mod work_cycle_import_repo_impl;
pub mod work_cycle_repo;

// 重导出核心仓储
pub use error::{RepositoryError, RepositoryResult};
pub use performance_repo::OperatorPerformanceRepository;
pub use recalc_run_repo::RecalcRunRepository;
pub use work_cycle_import_repo::WorkCycleImportRepository;
pub use work_cycle_import_repo_impl::WorkCycleImportRepositoryImpl;
pub use work_cycle_repo::{CorruptionSummary, UpsertCounts, WorkCycleRepository};
