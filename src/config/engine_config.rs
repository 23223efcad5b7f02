// ==========================================
// UPH 引擎 - 引擎阈值配置
// ==========================================
// 职责: 汇总损坏检测/聚合过滤/离群裁剪/导入的全部可调阈值
// 说明: 默认值为经验值，可通过 config_kv 覆写
// ==========================================

use crate::domain::types::WorkCenter;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_HARD_CAP_HOURS: f64 = 8.0;
pub const DEFAULT_ASSEMBLY_CEILING_HOURS_PER_UNIT: f64 = 2.0;
pub const DEFAULT_MIN_MO_DURATION_SECS: i64 = 120;
pub const DEFAULT_MAX_UPH: f64 = 500.0;
pub const DEFAULT_OUTLIER_TRIM_PCT: f64 = 0.10;
pub const DEFAULT_OUTLIER_MIN_GROUP_SIZE: usize = 3;
pub const DEFAULT_MIN_DURATION_SECS: i64 = 1;
pub const DEFAULT_MAX_DURATION_SECS: i64 = 24 * 3600;
pub const DEFAULT_IMPORT_CHUNK_SIZE: usize = 2000;

/// 引擎配置（重算时解析一次，快照写入 recalc_run）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// 单条工时硬上限（小时），超过即标记损坏
    pub hard_cap_hours: f64,

    /// 各工作中心"小时/件"上限；无条目的工作中心不做上下文检测
    pub context_ceilings: BTreeMap<WorkCenter, f64>,

    /// MO 时长下限（秒），低于视为噪声
    pub min_mo_duration_secs: i64,

    /// 单 MO UPH 上限
    pub max_uph: f64,

    /// 离群裁剪比例（每侧）
    pub outlier_trim_pct: f64,

    /// 离群裁剪最小组大小
    pub outlier_min_group_size: usize,

    /// 时长合法区间（秒）
    pub min_duration_secs: i64,
    pub max_duration_secs: i64,

    /// 导入分块大小
    pub import_chunk_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let mut context_ceilings = BTreeMap::new();
        context_ceilings.insert(WorkCenter::Assembly, DEFAULT_ASSEMBLY_CEILING_HOURS_PER_UNIT);

        Self {
            hard_cap_hours: DEFAULT_HARD_CAP_HOURS,
            context_ceilings,
            min_mo_duration_secs: DEFAULT_MIN_MO_DURATION_SECS,
            max_uph: DEFAULT_MAX_UPH,
            outlier_trim_pct: DEFAULT_OUTLIER_TRIM_PCT,
            outlier_min_group_size: DEFAULT_OUTLIER_MIN_GROUP_SIZE,
            min_duration_secs: DEFAULT_MIN_DURATION_SECS,
            max_duration_secs: DEFAULT_MAX_DURATION_SECS,
            import_chunk_size: DEFAULT_IMPORT_CHUNK_SIZE,
        }
    }
}

impl EngineConfig {
    /// 硬上限（秒）
    pub fn hard_cap_secs(&self) -> i64 {
        (self.hard_cap_hours * 3600.0).round() as i64
    }

    /// 指定工作中心的"小时/件"上限
    pub fn context_ceiling(&self, work_center: WorkCenter) -> Option<f64> {
        self.context_ceilings.get(&work_center).copied()
    }
}
