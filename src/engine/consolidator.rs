// ==========================================
// UPH 引擎 - 工时行合并器
// ==========================================
// 职责: 还原导出拆分: 同一逻辑工时被拆成多行，
//       每行带一段时长，只有一行带真实数量
// 分组键: (mo_id, operation_name, work_order_ref)
// 红线: 时长求和只允许发生在这里；数量绝不跨行累加
// ==========================================

use crate::domain::work_cycle::{
    ConsolidatedCycle, ConsolidationKey, CorruptionFlag, WorkCycleRecord,
};
use std::collections::HashMap;
use tracing::debug;

/// 合并输出
#[derive(Debug, Clone, Default)]
pub struct ConsolidationOutcome {
    /// 合并后的逻辑工时（按分组首行到达顺序）
    pub cycles: Vec<ConsolidatedCycle>,
    /// 被并入其他行的碎片数（成员数 - 1 的累计）
    pub merged_fragments: usize,
    /// 无正数量的合并工时数
    pub unresolvable_quantity: usize,
}

// ==========================================
// RowConsolidator
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct RowConsolidator;

impl RowConsolidator {
    pub fn new() -> Self {
        Self
    }

    /// 合并工时行
    ///
    /// 输入须已按到达顺序排列（仓储按 ingest_seq 读出）。
    /// 组内任一成员已损坏，合并工时即视为损坏（沿用首个损坏原因）。
    pub fn consolidate(&self, records: &[WorkCycleRecord]) -> ConsolidationOutcome {
        let mut index: HashMap<ConsolidationKey, usize> = HashMap::new();
        let mut cycles: Vec<ConsolidatedCycle> = Vec::new();

        for record in records {
            let key = record.consolidation_key();
            match index.get(&key) {
                Some(&pos) => merge_into(&mut cycles[pos], record),
                None => {
                    index.insert(key.clone(), cycles.len());
                    cycles.push(start_group(key, record));
                }
            }
        }

        let merged_fragments = records.len() - cycles.len();
        let unresolvable_quantity = cycles.iter().filter(|c| c.quantity.is_none()).count();

        debug!(
            input_rows = records.len(),
            consolidated = cycles.len(),
            merged_fragments,
            unresolvable_quantity,
            "工时行合并完成"
        );

        ConsolidationOutcome {
            cycles,
            merged_fragments,
            unresolvable_quantity,
        }
    }
}

fn positive(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v > 0.0)
}

fn start_group(key: ConsolidationKey, record: &WorkCycleRecord) -> ConsolidatedCycle {
    ConsolidatedCycle {
        key,
        operator_name: record.operator_name.clone(),
        work_center: record.work_center,
        operation_name: record.operation_name.clone(),
        routing_name: record.routing_name.clone(),
        mo_number: record.mo_number.clone(),
        mo_id: record.mo_id.clone(),
        duration_secs: record.duration_secs,
        quantity: positive(record.quantity_done),
        production_qty: positive(record.production_qty),
        member_cycle_ids: vec![record.cycle_id.clone()],
        corruption: record.corruption.clone(),
    }
}

fn merge_into(cycle: &mut ConsolidatedCycle, record: &WorkCycleRecord) {
    cycle.duration_secs += record.duration_secs;
    cycle.member_cycle_ids.push(record.cycle_id.clone());

    // 首个正数量胜出
    if cycle.quantity.is_none() {
        cycle.quantity = positive(record.quantity_done);
    }
    if cycle.production_qty.is_none() {
        cycle.production_qty = positive(record.production_qty);
    }

    if !cycle.corruption.corrupted && record.corruption.corrupted {
        cycle.corruption = CorruptionFlag {
            corrupted: true,
            reason: record.corruption.reason.clone(),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{DataSource, WorkCenter};

    fn cycle(id: &str, mo_id: &str, op: &str, secs: i64, qty: Option<f64>) -> WorkCycleRecord {
        WorkCycleRecord {
            cycle_id: id.to_string(),
            operator_name: "Alice".to_string(),
            work_center_raw: "Sewing".to_string(),
            work_center: WorkCenter::Assembly,
            operation_name: op.to_string(),
            work_order_ref: Some("WO-1".to_string()),
            mo_number: format!("MO{}", mo_id),
            mo_id: mo_id.to_string(),
            routing_name: "Tote Bag".to_string(),
            duration_raw: secs.to_string(),
            duration_secs: secs,
            quantity_done: qty,
            production_qty: None,
            created_at: None,
            data_source: DataSource::CsvImport,
            batch_id: None,
            corruption: CorruptionFlag::clean(),
        }
    }

    #[test]
    fn test_split_rows_consolidate_to_one_cycle() {
        let rows = vec![
            cycle("c1", "100", "Assembly", 600, Some(0.0)),
            cycle("c2", "100", "Assembly", 0, Some(20.0)),
        ];
        let outcome = RowConsolidator::new().consolidate(&rows);

        assert_eq!(outcome.cycles.len(), 1);
        assert_eq!(outcome.merged_fragments, 1);
        let c = &outcome.cycles[0];
        assert_eq!(c.duration_secs, 600);
        assert_eq!(c.quantity, Some(20.0));
        assert_eq!(c.member_cycle_ids, vec!["c1", "c2"]);
    }

    #[test]
    fn test_quantity_is_first_positive_never_sum() {
        let rows = vec![
            cycle("c1", "7", "Cut", 100, None),
            cycle("c2", "7", "Cut", 200, Some(5.0)),
            cycle("c3", "7", "Cut", 300, Some(9.0)),
        ];
        let outcome = RowConsolidator::new().consolidate(&rows);

        let c = &outcome.cycles[0];
        assert_eq!(c.duration_secs, 600);
        assert_eq!(c.quantity, Some(5.0));
    }

    #[test]
    fn test_different_keys_stay_separate_in_arrival_order() {
        let mut other_wo = cycle("c3", "1", "Sew", 50, Some(1.0));
        other_wo.work_order_ref = Some("WO-2".to_string());
        let rows = vec![
            cycle("c1", "2", "Sew", 10, Some(1.0)),
            cycle("c2", "1", "Sew", 20, Some(1.0)),
            other_wo,
        ];
        let outcome = RowConsolidator::new().consolidate(&rows);

        assert_eq!(outcome.cycles.len(), 3);
        assert_eq!(outcome.cycles[0].mo_id, "2");
        assert_eq!(outcome.cycles[1].mo_id, "1");
        assert_eq!(outcome.merged_fragments, 0);
    }

    #[test]
    fn test_no_positive_quantity_is_unresolvable() {
        let rows = vec![
            cycle("c1", "9", "Pack", 100, Some(0.0)),
            cycle("c2", "9", "Pack", 100, None),
        ];
        let outcome = RowConsolidator::new().consolidate(&rows);

        assert_eq!(outcome.cycles[0].quantity, None);
        assert_eq!(outcome.unresolvable_quantity, 1);
    }

    #[test]
    fn test_corrupted_member_taints_group() {
        let mut bad = cycle("c2", "5", "Sew", 100, None);
        bad.corruption = CorruptionFlag::flagged("hard cap");
        let rows = vec![cycle("c1", "5", "Sew", 100, Some(3.0)), bad];
        let outcome = RowConsolidator::new().consolidate(&rows);

        assert!(outcome.cycles[0].corruption.corrupted);
        assert_eq!(outcome.cycles[0].corruption.reason.as_deref(), Some("hard cap"));
    }
}
