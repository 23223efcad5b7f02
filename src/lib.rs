// ==========================================
// UPH 引擎 - 核心库
// ==========================================
// 职责: 工时导入 → 合并 → 损坏检测 → MO 聚合 → 操作员 UPH 绩效
// 技术栈: Rust + SQLite
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 聚合与数据完整性规则
pub mod engine;

// 导入层 - 外部工时数据
pub mod importer;

// 配置层 - 阈值配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// 性能埋点
pub mod perf;

// API 层 - 对外接口
pub mod api;

// 应用层 - 装配
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{DataSource, ImportMode, RunStatus, WorkCenter};

// 领域实体
pub use domain::{
    ConsolidatedCycle, EstimatedPerformanceRecord, ManufacturingOrderAggregate,
    OperatorPerformanceRecord, PerformanceLookup, RunResult, WorkCycleRecord,
};

// 引擎
pub use engine::{
    CorruptionDetector, DurationNormalizer, EstimationFallback, MoAggregator,
    OperatorPerformanceAggregator, OutlierFilter, RecalcEngine, RowConsolidator,
    WorkCenterClassifier,
};

// API
pub use api::{ApiError, ImportApi, PerformanceApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "UPH 引擎";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
