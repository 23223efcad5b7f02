// ==========================================
// UPH 引擎 - 引擎层
// ==========================================
// 流水线: 时长归一化 + 工作中心分类 → 合并 → 损坏检测
//        → MO 聚合 → 操作员绩效 → 持久化快照
// 读时变换: 离群过滤 / 估算回退
// 红线: 引擎不直接拼 SQL，数据访问全部经由仓储层
// ==========================================

pub mod consolidator;
pub mod corruption;
pub mod duration;
pub mod error;
pub mod estimation;
pub mod mo_aggregator;
pub mod outlier;
pub mod performance;
pub mod recalc;
pub mod work_center;

// 重导出核心引擎
pub use consolidator::{ConsolidationOutcome, RowConsolidator};
pub use corruption::{CorruptionDetector, CorruptionTier, DetectionOutcome, FlaggedCycle};
pub use duration::{parse_duration_secs, parse_hms, seconds_to_hms, DurationNormalizer};
pub use error::{EngineError, EngineResult};
pub use estimation::EstimationFallback;
pub use mo_aggregator::{MoAggregationOutcome, MoAggregator};
pub use outlier::{OutlierFilter, TrimmedView};
pub use performance::{OperatorPerformanceAggregator, PerformanceOutcome};
pub use recalc::{CancellationFlag, RecalcEngine};
pub use work_center::{Classification, ClassificationRule, WorkCenterClassifier};
