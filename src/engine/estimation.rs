// ==========================================
// UPH 引擎 - 估算回退
// ==========================================
// 职责: 目标 (操作员, 工作中心, 工艺路线) 无直接观测时，按优先级寻找替代值
// 优先级:
//   1. 同操作员 + 同工作中心，其他工艺路线的平均
//   2. 同工作中心 + 同工艺路线，其他操作员的平均
//   3. 同工作中心全部记录的平均
// 红线: 估算结果只在读时返回，绝不写回权威绩效表
// ==========================================

use crate::domain::performance::{
    EstimatedPerformanceRecord, OperatorPerformanceRecord, PerformanceKey, PerformanceLookup,
};
use crate::engine::performance::mean;

#[derive(Debug, Clone, Default)]
pub struct EstimationFallback;

impl EstimationFallback {
    pub fn new() -> Self {
        Self
    }

    /// 读时解析: 有直接观测返回 Observed，否则尝试估算
    pub fn resolve(
        &self,
        key: &PerformanceKey,
        records: &[OperatorPerformanceRecord],
    ) -> PerformanceLookup {
        if let Some(found) = records
            .iter()
            .find(|r| r.key() == *key && r.observation_count > 0)
        {
            return PerformanceLookup::Observed(found.clone());
        }
        match self.estimate(key, records) {
            Some(estimated) => PerformanceLookup::Estimated(estimated),
            None => PerformanceLookup::NotFound,
        }
    }

    /// 按优先级估算
    pub fn estimate(
        &self,
        key: &PerformanceKey,
        records: &[OperatorPerformanceRecord],
    ) -> Option<EstimatedPerformanceRecord> {
        let same_center: Vec<&OperatorPerformanceRecord> = records
            .iter()
            .filter(|r| r.work_center == key.work_center && r.observation_count > 0)
            .filter(|r| r.key() != *key)
            .collect();

        let tiers: [(Vec<&OperatorPerformanceRecord>, String); 3] = [
            (
                same_center
                    .iter()
                    .copied()
                    .filter(|r| r.operator_name == key.operator_name)
                    .collect(),
                format!(
                    "derived from {}'s average at {} across other routings",
                    key.operator_name, key.work_center
                ),
            ),
            (
                same_center
                    .iter()
                    .copied()
                    .filter(|r| r.routing_name == key.routing_name)
                    .collect(),
                format!(
                    "derived from routing-wide average for {} at {}",
                    key.routing_name, key.work_center
                ),
            ),
            (
                same_center.clone(),
                format!("derived from work-center-wide average at {}", key.work_center),
            ),
        ];

        tiers
            .into_iter()
            .find(|(basis, _)| !basis.is_empty())
            .map(|(basis, reason)| {
                let uphs: Vec<f64> = basis.iter().map(|r| r.uph).collect();
                EstimatedPerformanceRecord {
                    operator_name: key.operator_name.clone(),
                    work_center: key.work_center,
                    routing_name: key.routing_name.clone(),
                    uph: mean(&uphs),
                    basis_observation_count: basis.iter().map(|r| r.observation_count).sum(),
                    source_reason: format!("{} ({} records)", reason, basis.len()),
                    is_estimated: true,
                }
            })
    }
}
