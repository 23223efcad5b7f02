// ==========================================
// UPH 引擎 - 重复检测
// ==========================================
// 阶段 5: cycle_id 重复检测
// 策略:
// - 同批次内重复: 首次出现生效，后续行跳过并计为重复
// - 跨批次（库中已存在）: 追加模式下忽略，纠正模式下覆盖
// ==========================================

use crate::importer::work_cycle_importer_trait::ConflictHandler as ConflictHandlerTrait;
use std::collections::HashSet;

pub struct ConflictHandler;

impl ConflictHandlerTrait for ConflictHandler {
    fn detect_duplicates(&self, records: &[(usize, String)]) -> Vec<(usize, String)> {
        let mut seen: HashSet<&str> = HashSet::new();
        records
            .iter()
            .filter(|(_, cycle_id)| !seen.insert(cycle_id.as_str()))
            .cloned()
            .collect()
    }

    fn detect_existing(
        &self,
        records: &[(usize, String)],
        existing_ids: &[String],
    ) -> Vec<(usize, String)> {
        let existing: HashSet<&str> = existing_ids.iter().map(String::as_str).collect();
        records
            .iter()
            .filter(|(_, cycle_id)| existing.contains(cycle_id.as_str()))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(pairs: &[(usize, &str)]) -> Vec<(usize, String)> {
        pairs.iter().map(|(r, id)| (*r, id.to_string())).collect()
    }

    #[test]
    fn test_first_occurrence_wins() {
        let records = ids(&[(1, "c1"), (2, "c2"), (3, "c1"), (4, "c1")]);
        let duplicates = ConflictHandler.detect_duplicates(&records);
        assert_eq!(duplicates, ids(&[(3, "c1"), (4, "c1")]));
    }

    #[test]
    fn test_detect_existing() {
        let records = ids(&[(1, "c1"), (2, "c2")]);
        let existing = vec!["c2".to_string(), "c9".to_string()];
        assert_eq!(
            ConflictHandler.detect_existing(&records, &existing),
            ids(&[(2, "c2")])
        );
    }
}
