// ==========================================
// UPH 引擎 - 损坏检测器
// ==========================================
// 职责: 标记隐含产出率在物理上不可能的合并工时
// 策略:
// - 硬阈值: 单条工时时长 > hard_cap（默认 8 小时）
// - 上下文阈值: 按 (操作员, 工艺路线, 工作中心) 分组计算"小时/件"，
//   超过该工作中心上限则整组标记
// 红线: 幂等，已标记的不重复标记，也绝不取消标记
// ==========================================

use crate::config::engine_config::EngineConfig;
use crate::domain::types::WorkCenter;
use crate::domain::work_cycle::{ConsolidatedCycle, CorruptionFlag};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

/// 标记层级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CorruptionTier {
    Hard,
    Context,
}

/// 本次新增的标记（成员 ID 用于回写原始工时行）
#[derive(Debug, Clone, PartialEq)]
pub struct FlaggedCycle {
    pub member_cycle_ids: Vec<String>,
    pub reason: String,
    pub tier: CorruptionTier,
}

#[derive(Debug, Clone, Default)]
pub struct DetectionOutcome {
    pub newly_flagged: Vec<FlaggedCycle>,
    pub hard_count: usize,
    pub context_count: usize,
}

impl DetectionOutcome {
    /// 本次新标记的原始工时 ID（展开）
    pub fn flagged_cycle_ids(&self) -> impl Iterator<Item = (&str, &str)> {
        self.newly_flagged.iter().flat_map(|f| {
            f.member_cycle_ids
                .iter()
                .map(move |id| (id.as_str(), f.reason.as_str()))
        })
    }
}

// ==========================================
// CorruptionDetector
// ==========================================
#[derive(Debug, Clone)]
pub struct CorruptionDetector {
    hard_cap_secs: i64,
    context_ceilings: BTreeMap<WorkCenter, f64>,
}

impl Default for CorruptionDetector {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl CorruptionDetector {
    pub fn new(hard_cap_secs: i64, context_ceilings: BTreeMap<WorkCenter, f64>) -> Self {
        Self {
            hard_cap_secs,
            context_ceilings,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.hard_cap_secs(), config.context_ceilings.clone())
    }

    /// 检测并就地标记
    ///
    /// 先跑硬阈值，再对剩余未损坏、带数量的工时跑上下文阈值。
    pub fn detect(&self, cycles: &mut [ConsolidatedCycle]) -> DetectionOutcome {
        let mut outcome = DetectionOutcome::default();

        // ===== 硬阈值 =====
        for cycle in cycles.iter_mut().filter(|c| !c.corruption.corrupted) {
            if cycle.duration_secs > self.hard_cap_secs {
                let reason = format!(
                    "HARD_CAP: 时长 {:.2}h 超过上限 {:.2}h",
                    cycle.duration_hours(),
                    self.hard_cap_secs as f64 / 3600.0
                );
                flag(cycle, reason, CorruptionTier::Hard, &mut outcome);
                outcome.hard_count += 1;
            }
        }

        // ===== 上下文阈值 =====
        let mut groups: HashMap<(String, String, WorkCenter), (f64, f64, Vec<usize>)> =
            HashMap::new();
        for (idx, cycle) in cycles.iter().enumerate() {
            if cycle.corruption.corrupted || !self.context_ceilings.contains_key(&cycle.work_center)
            {
                continue;
            }
            let Some(qty) = cycle.quantity else {
                continue;
            };
            let entry = groups
                .entry((
                    cycle.operator_name.clone(),
                    cycle.routing_name.clone(),
                    cycle.work_center,
                ))
                .or_insert((0.0, 0.0, Vec::new()));
            entry.0 += cycle.duration_hours();
            entry.1 += qty;
            entry.2.push(idx);
        }

        // 排序保证输出顺序确定
        let mut ordered: Vec<_> = groups.into_iter().collect();
        ordered.sort_by(|a, b| a.0.cmp(&b.0));

        for ((operator, routing, work_center), (hours, qty, members)) in ordered {
            let Some(ceiling) = self.context_ceilings.get(&work_center).copied() else {
                continue;
            };
            if qty <= 0.0 {
                continue;
            }
            let hours_per_unit = hours / qty;
            if hours_per_unit <= ceiling {
                continue;
            }

            warn!(
                operator = %operator,
                routing = %routing,
                work_center = %work_center,
                hours_per_unit,
                ceiling,
                cycles = members.len(),
                "上下文阈值超限，整组标记损坏"
            );
            for idx in members {
                let reason = format!(
                    "CONTEXT: {} 小时/件 {:.2} 超过上限 {:.2}",
                    work_center, hours_per_unit, ceiling
                );
                flag(&mut cycles[idx], reason, CorruptionTier::Context, &mut outcome);
                outcome.context_count += 1;
            }
        }

        debug!(
            hard = outcome.hard_count,
            context = outcome.context_count,
            "损坏检测完成"
        );
        outcome
    }
}

fn flag(
    cycle: &mut ConsolidatedCycle,
    reason: String,
    tier: CorruptionTier,
    outcome: &mut DetectionOutcome,
) {
    cycle.corruption = CorruptionFlag::flagged(reason.clone());
    outcome.newly_flagged.push(FlaggedCycle {
        member_cycle_ids: cycle.member_cycle_ids.clone(),
        reason,
        tier,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::work_cycle::ConsolidationKey;

    fn consolidated(
        id: &str,
        work_center: WorkCenter,
        secs: i64,
        qty: Option<f64>,
    ) -> ConsolidatedCycle {
        ConsolidatedCycle {
            key: ConsolidationKey {
                mo_id: id.to_string(),
                operation_name: "Op".to_string(),
                work_order_ref: String::new(),
            },
            operator_name: "Bob".to_string(),
            work_center,
            operation_name: "Op".to_string(),
            routing_name: "Rope Leash".to_string(),
            mo_number: format!("MO-{}", id),
            mo_id: id.to_string(),
            duration_secs: secs,
            quantity: qty,
            production_qty: None,
            member_cycle_ids: vec![id.to_string()],
            corruption: CorruptionFlag::clean(),
        }
    }

    #[test]
    fn test_nine_hour_cycle_flagged_by_hard_cap() {
        let mut cycles = vec![consolidated("a", WorkCenter::Cutting, 9 * 3600, Some(50.0))];
        let outcome = CorruptionDetector::default().detect(&mut cycles);

        assert!(cycles[0].corruption.corrupted);
        assert_eq!(outcome.hard_count, 1);
        assert_eq!(outcome.newly_flagged[0].tier, CorruptionTier::Hard);
    }

    #[test]
    fn test_exactly_hard_cap_not_flagged() {
        let mut cycles = vec![consolidated("a", WorkCenter::Cutting, 8 * 3600, Some(50.0))];
        let outcome = CorruptionDetector::default().detect(&mut cycles);
        assert!(!cycles[0].corruption.corrupted);
        assert!(outcome.newly_flagged.is_empty());
    }

    #[test]
    fn test_context_threshold_flags_whole_group() {
        // 组合计: 6h / 2 件 = 3 h/件 > 2.0
        let mut cycles = vec![
            consolidated("a", WorkCenter::Assembly, 3 * 3600, Some(1.0)),
            consolidated("b", WorkCenter::Assembly, 3 * 3600, Some(1.0)),
        ];
        let outcome = CorruptionDetector::default().detect(&mut cycles);

        assert_eq!(outcome.context_count, 2);
        assert!(cycles.iter().all(|c| c.corruption.corrupted));
    }

    #[test]
    fn test_context_threshold_skips_work_center_without_ceiling() {
        let mut cycles = vec![consolidated("a", WorkCenter::Cutting, 4 * 3600, Some(1.0))];
        let outcome = CorruptionDetector::default().detect(&mut cycles);
        assert_eq!(outcome.context_count, 0);
    }

    #[test]
    fn test_detection_is_idempotent() {
        let detector = CorruptionDetector::default();
        let mut cycles = vec![
            consolidated("a", WorkCenter::Cutting, 9 * 3600, Some(50.0)),
            consolidated("b", WorkCenter::Assembly, 600, Some(10.0)),
        ];

        let first = detector.detect(&mut cycles);
        assert_eq!(first.newly_flagged.len(), 1);

        let snapshot: Vec<_> = cycles.iter().map(|c| c.corruption.clone()).collect();
        let second = detector.detect(&mut cycles);
        assert!(second.newly_flagged.is_empty());
        let after: Vec<_> = cycles.iter().map(|c| c.corruption.clone()).collect();
        assert_eq!(snapshot, after);
    }

    #[test]
    fn test_existing_flag_never_cleared() {
        let mut cycle = consolidated("a", WorkCenter::Cutting, 600, Some(10.0));
        cycle.corruption = CorruptionFlag::flagged("manual");
        let mut cycles = vec![cycle];

        CorruptionDetector::default().detect(&mut cycles);
        assert_eq!(cycles[0].corruption.reason.as_deref(), Some("manual"));
    }
}
