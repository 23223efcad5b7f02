// ==========================================
// UPH 引擎 - 重算流水线（纯内存）
// ==========================================
// 阶段: 合并 → 损坏检测 → MO 聚合 → 操作员绩效
// 说明: 不做任何 I/O；首尾的读写由 RecalcEngine 负责
// ==========================================

use super::types::{CancellationFlag, PipelineOutput};
use crate::config::engine_config::EngineConfig;
use crate::domain::run::RunSummary;
use crate::domain::work_cycle::WorkCycleRecord;
use crate::engine::consolidator::RowConsolidator;
use crate::engine::corruption::CorruptionDetector;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::mo_aggregator::MoAggregator;
use crate::engine::performance::OperatorPerformanceAggregator;
use chrono::{DateTime, Utc};
use tracing::debug;

fn checkpoint(cancel: &CancellationFlag, stage: &str) -> EngineResult<()> {
    if cancel.is_cancelled() {
        debug!(stage, "重算在阶段边界被取消");
        return Err(EngineError::Cancelled);
    }
    Ok(())
}

/// 执行内存流水线
pub fn run_pipeline(
    cycles: &[WorkCycleRecord],
    config: &EngineConfig,
    updated_at: DateTime<Utc>,
    cancel: &CancellationFlag,
) -> EngineResult<PipelineOutput> {
    let mut summary = RunSummary {
        cycles_loaded: cycles.len(),
        cycles_already_corrupted: cycles.iter().filter(|c| c.corruption.corrupted).count(),
        ..Default::default()
    };

    // 步骤 1: 合并拆分行
    checkpoint(cancel, "consolidate")?;
    debug!("步骤 1: 合并拆分行");
    let consolidation = RowConsolidator::new().consolidate(cycles);
    let mut consolidated = consolidation.cycles;
    summary.consolidated_cycles = consolidated.len();
    summary.merged_fragments = consolidation.merged_fragments;
    summary.unresolvable_quantity = consolidation.unresolvable_quantity;
    summary.zero_duration = consolidated.iter().filter(|c| c.duration_secs == 0).count();

    // 步骤 2: 损坏检测
    checkpoint(cancel, "detect")?;
    debug!("步骤 2: 损坏检测");
    let detection = CorruptionDetector::from_config(config).detect(&mut consolidated);
    summary.newly_flagged_hard = detection.hard_count;
    summary.newly_flagged_context = detection.context_count;
    let newly_flagged = detection
        .flagged_cycle_ids()
        .map(|(id, reason)| (id.to_string(), reason.to_string()))
        .collect();

    // 步骤 3: MO 聚合
    checkpoint(cancel, "aggregate_mo")?;
    debug!("步骤 3: MO 聚合");
    let mo = MoAggregator::new().aggregate(&consolidated);
    summary.mo_aggregates = mo.aggregates.len();
    summary.mo_dropped_zero = mo.dropped_zero;

    // 步骤 4: 操作员绩效
    checkpoint(cancel, "aggregate_operator")?;
    debug!("步骤 4: 操作员绩效聚合");
    let performance =
        OperatorPerformanceAggregator::from_config(config).aggregate(&mo.aggregates, updated_at);
    summary.rejected_short_duration = performance.rejected_short_duration;
    summary.rejected_uph_ceiling = performance.rejected_uph_ceiling;
    summary.observations = performance.observations.len();
    summary.performance_records = performance.records.len();

    Ok(PipelineOutput {
        records: performance.records,
        observations: performance.observations,
        newly_flagged,
        summary,
    })
}
