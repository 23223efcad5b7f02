// ==========================================
// UPH 引擎 - 重算运行模型
// ==========================================
// 职责: 重算结果 / 数据质量汇总 / 运行日志
// 说明: 运行状态由调用方持有，不使用进程级全局变量
// ==========================================

use crate::domain::types::RunStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// RunSummary - 运行汇总（数据质量审计）
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub cycles_loaded: usize,          // 读入的工时行
    pub cycles_already_corrupted: usize, // 历史已标记（直接排除）
    pub consolidated_cycles: usize,    // 合并后的逻辑工时
    pub merged_fragments: usize,       // 被合并掉的碎片行数
    pub unresolvable_quantity: usize,  // 无正数量的合并工时
    pub zero_duration: usize,          // 合并后时长为 0
    pub newly_flagged_hard: usize,     // 本次硬阈值新标记
    pub newly_flagged_context: usize,  // 本次上下文阈值新标记
    pub mo_aggregates: usize,          // MO 聚合数
    pub mo_dropped_zero: usize,        // 数量或时长为 0 的 MO
    pub rejected_short_duration: usize, // MO 时长过短（噪声）
    pub rejected_uph_ceiling: usize,   // MO UPH 超上限
    pub observations: usize,           // 最终进入平均的 MO 数
    pub performance_records: usize,    // 输出绩效记录数
}

impl RunSummary {
    pub fn newly_flagged(&self) -> usize {
        self.newly_flagged_hard + self.newly_flagged_context
    }
}

// ==========================================
// RunResult - recalculate() 返回值
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: String,
    pub status: RunStatus,
    pub succeeded: bool,
    pub record_count: usize,
    pub errors: Vec<String>,
    pub summary: RunSummary,
    pub elapsed_ms: i64,
}

// ==========================================
// RecalcRun - 运行日志
// ==========================================
// 对齐: recalc_run 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecalcRun {
    pub run_id: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub record_count: i64,
    pub summary_json: Option<String>,
    pub error_message: Option<String>,
    pub config_snapshot_json: Option<String>,
}
