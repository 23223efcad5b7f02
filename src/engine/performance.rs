// ==========================================
// UPH 引擎 - 操作员绩效聚合器
// ==========================================
// 职责: 单 MO UPH → (操作员, 工作中心, 工艺路线) 绩效记录
// 过滤:
// - MO 时长 < min_mo_duration_secs（噪声）
// - 单 MO UPH > max_uph（漏检的残余损坏）
// 红线: 存储 UPH = 单 MO UPH 的算术平均，不是总数量/总时长
// ==========================================

use crate::config::engine_config::EngineConfig;
use crate::domain::performance::{
    ManufacturingOrderAggregate, MoObservation, OperatorPerformanceRecord, PerformanceKey,
};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// 绩效记录的来源标记
pub const PERFORMANCE_DATA_SOURCE: &str = "WORK_CYCLE_RECALC";

#[derive(Debug, Clone, Default)]
pub struct PerformanceOutcome {
    pub records: Vec<OperatorPerformanceRecord>,
    /// 参与平均的单 MO 观测（离群过滤的素材）
    pub observations: Vec<MoObservation>,
    pub rejected_short_duration: usize,
    pub rejected_uph_ceiling: usize,
}

// ==========================================
// OperatorPerformanceAggregator
// ==========================================
#[derive(Debug, Clone)]
pub struct OperatorPerformanceAggregator {
    min_mo_duration_secs: i64,
    max_uph: f64,
}

impl Default for OperatorPerformanceAggregator {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl OperatorPerformanceAggregator {
    pub fn new(min_mo_duration_secs: i64, max_uph: f64) -> Self {
        Self {
            min_mo_duration_secs,
            max_uph,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.min_mo_duration_secs, config.max_uph)
    }

    /// 聚合
    ///
    /// `updated_at` 由调用方传入，同一次运行的所有记录共享同一时间戳。
    pub fn aggregate(
        &self,
        aggregates: &[ManufacturingOrderAggregate],
        updated_at: DateTime<Utc>,
    ) -> PerformanceOutcome {
        let mut outcome = PerformanceOutcome::default();
        let mut groups: BTreeMap<PerformanceKey, (Vec<f64>, BTreeSet<String>)> = BTreeMap::new();

        for agg in aggregates {
            if agg.duration_secs < self.min_mo_duration_secs {
                outcome.rejected_short_duration += 1;
                continue;
            }
            let uph = agg.uph();
            if !uph.is_finite() || uph > self.max_uph {
                outcome.rejected_uph_ceiling += 1;
                continue;
            }

            let (uphs, operations) = groups.entry(agg.key()).or_default();
            uphs.push(uph);
            operations.extend(agg.operations.iter().cloned());

            outcome.observations.push(MoObservation {
                operator_name: agg.operator_name.clone(),
                work_center: agg.work_center,
                routing_name: agg.routing_name.clone(),
                mo_number: agg.mo_number.clone(),
                uph,
                duration_secs: agg.duration_secs,
                quantity: agg.quantity,
            });
        }

        for (key, (uphs, operations)) in groups {
            outcome.records.push(OperatorPerformanceRecord {
                operator_name: key.operator_name,
                work_center: key.work_center,
                routing_name: key.routing_name,
                uph: mean(&uphs),
                observation_count: uphs.len() as i64,
                operations,
                data_source: PERFORMANCE_DATA_SOURCE.to_string(),
                updated_at,
            });
        }

        debug!(
            records = outcome.records.len(),
            observations = outcome.observations.len(),
            rejected_short = outcome.rejected_short_duration,
            rejected_uph = outcome.rejected_uph_ceiling,
            "操作员绩效聚合完成"
        );
        outcome
    }
}

/// 算术平均（空集返回 0）
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
