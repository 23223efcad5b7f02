// ==========================================
// UPH 引擎 - 重算引擎
// ==========================================
// 职责: 全量重算操作员绩效快照
// 状态机: Idle → Running → (Succeeded | Failed)
// 红线:
// - 同一时刻至多一个重算在运行，后续触发直接拒绝（不排队）
// - 快照只在最后一步原子替换；失败/取消时旧快照保持不变
// - 运行状态由引擎实例持有，不使用进程级全局变量
// ==========================================

mod core;
mod pipeline;
mod types;

pub use pipeline::run_pipeline;
pub use types::{CancellationFlag, PipelineOutput};

use crate::config::ConfigManager;
use crate::domain::types::RunStatus;
use crate::repository::{OperatorPerformanceRepository, RecalcRunRepository, WorkCycleRepository};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

// ==========================================
// RecalcEngine - 重算引擎
// ==========================================
pub struct RecalcEngine {
    cycle_repo: Arc<WorkCycleRepository>,
    performance_repo: Arc<OperatorPerformanceRepository>,
    run_repo: Arc<RecalcRunRepository>,
    config_manager: Arc<ConfigManager>,

    /// 运行守卫（compare_exchange 抢占）
    running: AtomicBool,
    /// 最近一次运行的状态（供轮询）
    status: Mutex<RunStatus>,
    cancel: CancellationFlag,
}
