// ==========================================
// UPH 引擎 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod performance;
pub mod run;
pub mod types;
pub mod work_cycle;

// 重导出核心类型
pub use performance::{
    EstimatedPerformanceRecord, ManufacturingOrderAggregate, MoObservation,
    OperatorPerformanceRecord, Page, PerformanceFilter, PerformanceKey, PerformanceLookup,
    QuantitySource,
};
pub use run::{RecalcRun, RunResult, RunSummary};
pub use types::{DataSource, ImportMode, RunStatus, WorkCenter};
pub use work_cycle::{
    ConsolidatedCycle, ConsolidationKey, CorruptionFlag, DqKind, DqLevel, DqSummary,
    DqViolation, ImportBatch, ImportReport, RawWorkCycleRecord, WorkCycleRecord,
};
