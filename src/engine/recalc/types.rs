use crate::domain::performance::{MoObservation, OperatorPerformanceRecord};
use crate::domain::run::RunSummary;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// ==========================================
// CancellationFlag - 取消标记
// ==========================================
/// 在阶段之间检查；最终原子替换之前取消不会影响旧快照
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    inner: Arc<AtomicBool>,
}

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.load(Ordering::SeqCst)
    }

    pub(crate) fn reset(&self) {
        self.inner.store(false, Ordering::SeqCst);
    }
}

// ==========================================
// PipelineOutput - 内存流水线产物（内部使用）
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct PipelineOutput {
    /// 新的绩效快照
    pub records: Vec<OperatorPerformanceRecord>,
    /// 参与平均的单 MO 观测
    pub observations: Vec<MoObservation>,
    /// 本次新标记的原始工时 (cycle_id, reason)
    pub newly_flagged: Vec<(String, String)>,
    pub summary: RunSummary,
}
