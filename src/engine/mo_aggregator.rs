// ==========================================
// UPH 引擎 - 制造订单聚合器
// ==========================================
// 职责: 将合并后、未损坏的工时按 (操作员, 工作中心, 工艺路线, MO 号) 分组
// 产量优先级:
//   1. 权威生产订单数量（production_qty）
//   2. 合并工时的解析数量（回退）
// 红线: 产量每个 MO 只取一次，绝不跨工时累加；时长求和
// ==========================================

use crate::domain::performance::{ManufacturingOrderAggregate, QuantitySource};
use crate::domain::types::WorkCenter;
use crate::domain::work_cycle::ConsolidatedCycle;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

type MoKey = (String, WorkCenter, String, String);

#[derive(Debug, Clone, Default)]
pub struct MoAggregationOutcome {
    /// 按键排序的聚合结果
    pub aggregates: Vec<ManufacturingOrderAggregate>,
    pub excluded_corrupted: usize,
    pub excluded_unresolvable: usize,
    /// 产量或时长为 0 被丢弃的 MO
    pub dropped_zero: usize,
}

/// 分组中间态
struct Accumulator {
    duration_secs: i64,
    production_qty: Option<f64>,
    cycle_qty: Option<f64>,
    operations: BTreeSet<String>,
    cycle_count: usize,
}

// ==========================================
// MoAggregator
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct MoAggregator;

impl MoAggregator {
    pub fn new() -> Self {
        Self
    }

    pub fn aggregate(&self, cycles: &[ConsolidatedCycle]) -> MoAggregationOutcome {
        let mut outcome = MoAggregationOutcome::default();
        let mut groups: BTreeMap<MoKey, Accumulator> = BTreeMap::new();

        for cycle in cycles {
            if cycle.corruption.corrupted {
                outcome.excluded_corrupted += 1;
                continue;
            }
            let Some(qty) = cycle.quantity else {
                outcome.excluded_unresolvable += 1;
                continue;
            };

            let key = (
                cycle.operator_name.clone(),
                cycle.work_center,
                cycle.routing_name.clone(),
                cycle.mo_number.clone(),
            );
            let acc = groups.entry(key).or_insert_with(|| Accumulator {
                duration_secs: 0,
                production_qty: None,
                cycle_qty: None,
                operations: BTreeSet::new(),
                cycle_count: 0,
            });

            acc.duration_secs += cycle.duration_secs;
            acc.cycle_count += 1;
            acc.operations.insert(cycle.operation_name.clone());
            if acc.production_qty.is_none() {
                acc.production_qty = cycle.production_qty;
            }
            if acc.cycle_qty.is_none() {
                acc.cycle_qty = Some(qty);
            }
        }

        for ((operator_name, work_center, routing_name, mo_number), acc) in groups {
            let (quantity, quantity_source) = match (acc.production_qty, acc.cycle_qty) {
                (Some(q), _) => (q, QuantitySource::ProductionOrder),
                (None, Some(q)) => (q, QuantitySource::CycleQuantity),
                (None, None) => (0.0, QuantitySource::CycleQuantity),
            };

            if quantity <= 0.0 || acc.duration_secs <= 0 {
                outcome.dropped_zero += 1;
                continue;
            }

            outcome.aggregates.push(ManufacturingOrderAggregate {
                operator_name,
                work_center,
                routing_name,
                mo_number,
                duration_secs: acc.duration_secs,
                quantity,
                quantity_source,
                operations: acc.operations,
                cycle_count: acc.cycle_count,
            });
        }

        debug!(
            aggregates = outcome.aggregates.len(),
            excluded_corrupted = outcome.excluded_corrupted,
            excluded_unresolvable = outcome.excluded_unresolvable,
            dropped_zero = outcome.dropped_zero,
            "MO 聚合完成"
        );
        outcome
    }
}
