// ==========================================
// UPH 引擎 - 离群过滤（报表视图）
// ==========================================
// 职责: 在 (工作中心, 工艺路线) 上下文内裁剪单 MO UPH 两侧尾部，重算平均
// 规则:
// - 每侧裁剪 floor(n * pct) 个观测
// - 观测数 < min_group_size 的上下文不裁剪
// - 可选硬边界 [min_uph, max_uph] 先于百分比裁剪
// 红线: 纯视图，不修改持久化的绩效记录
// ==========================================

use crate::config::engine_config::EngineConfig;
use crate::domain::performance::{MoObservation, OperatorPerformanceRecord, PerformanceKey};
use crate::domain::types::WorkCenter;
use crate::engine::performance::mean;
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Debug, Clone, Default)]
pub struct TrimmedView {
    pub records: Vec<OperatorPerformanceRecord>,
    pub removed_observations: usize,
}

// ==========================================
// OutlierFilter
// ==========================================
#[derive(Debug, Clone)]
pub struct OutlierFilter {
    trim_pct: f64,
    min_group_size: usize,
    hard_min_uph: Option<f64>,
    hard_max_uph: Option<f64>,
}

impl Default for OutlierFilter {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl OutlierFilter {
    pub fn new(trim_pct: f64, min_group_size: usize) -> Self {
        Self {
            trim_pct: trim_pct.clamp(0.0, 0.5),
            min_group_size,
            hard_min_uph: None,
            hard_max_uph: None,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.outlier_trim_pct, config.outlier_min_group_size)
    }

    /// 附加硬边界（闭区间）
    pub fn with_hard_bounds(mut self, min_uph: Option<f64>, max_uph: Option<f64>) -> Self {
        self.hard_min_uph = min_uph;
        self.hard_max_uph = max_uph;
        self
    }

    /// 每侧裁剪数
    pub fn trim_count(&self, n: usize) -> usize {
        if n < self.min_group_size {
            return 0;
        }
        let k = ((n as f64) * self.trim_pct + 1e-9).floor() as usize;
        if k * 2 >= n {
            return 0;
        }
        k
    }

    /// 生成裁剪后的视图
    ///
    /// `records` 只提供元数据（操作集合、来源、更新时间）；
    /// 平均值与观测数由保留下来的 `observations` 重算。
    pub fn apply(
        &self,
        records: &[OperatorPerformanceRecord],
        observations: &[MoObservation],
    ) -> TrimmedView {
        let mut contexts: BTreeMap<(WorkCenter, String), Vec<&MoObservation>> = BTreeMap::new();
        let mut removed = 0usize;

        for obs in observations {
            if self.hard_min_uph.is_some_and(|min| obs.uph < min)
                || self.hard_max_uph.is_some_and(|max| obs.uph > max)
            {
                removed += 1;
                continue;
            }
            contexts
                .entry((obs.work_center, obs.routing_name.clone()))
                .or_default()
                .push(obs);
        }

        let mut kept: HashMap<PerformanceKey, Vec<f64>> = HashMap::new();
        for (_, mut group) in contexts {
            group.sort_by(|a, b| {
                a.uph
                    .total_cmp(&b.uph)
                    .then_with(|| a.operator_name.cmp(&b.operator_name))
                    .then_with(|| a.mo_number.cmp(&b.mo_number))
            });
            let k = self.trim_count(group.len());
            removed += k * 2;
            for obs in &group[k..group.len() - k] {
                kept.entry(obs.key()).or_default().push(obs.uph);
            }
        }

        let mut seen: HashSet<PerformanceKey> = HashSet::new();
        let mut trimmed = Vec::new();
        for record in records {
            let key = record.key();
            if !seen.insert(key.clone()) {
                continue;
            }
            let Some(uphs) = kept.get(&key) else {
                continue;
            };
            let mut view = record.clone();
            view.uph = mean(uphs);
            view.observation_count = uphs.len() as i64;
            trimmed.push(view);
        }

        TrimmedView {
            records: trimmed,
            removed_observations: removed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn obs(operator: &str, mo: &str, uph: f64) -> MoObservation {
        MoObservation {
            operator_name: operator.to_string(),
            work_center: WorkCenter::Cutting,
            routing_name: "Mat".to_string(),
            mo_number: mo.to_string(),
            uph,
            duration_secs: 3600,
            quantity: uph,
        }
    }

    fn record(operator: &str, uph: f64, count: i64) -> OperatorPerformanceRecord {
        OperatorPerformanceRecord {
            operator_name: operator.to_string(),
            work_center: WorkCenter::Cutting,
            routing_name: "Mat".to_string(),
            uph,
            observation_count: count,
            operations: Default::default(),
            data_source: "TEST".to_string(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_trim_ten_percent_of_ten_removes_one_per_tail() {
        let filter = OutlierFilter::new(0.10, 3);
        assert_eq!(filter.trim_count(10), 1);

        let observations: Vec<_> = (1..=10).map(|i| obs("Eve", &format!("MO{}", i), i as f64)).collect();
        let records = vec![record("Eve", 5.5, 10)];
        let view = filter.apply(&records, &observations);

        assert_eq!(view.removed_observations, 2);
        assert_eq!(view.records[0].observation_count, 8);
        // 2..=9 的平均
        assert!((view.records[0].uph - 5.5).abs() < 1e-9);
    }

    #[test]
    fn test_small_group_never_trimmed() {
        let filter = OutlierFilter::new(0.40, 3);
        assert_eq!(filter.trim_count(2), 0);

        let observations = vec![obs("Eve", "MO1", 10.0), obs("Eve", "MO2", 90.0)];
        let records = vec![record("Eve", 50.0, 2)];
        let view = filter.apply(&records, &observations);

        assert_eq!(view.removed_observations, 0);
        assert_eq!(view.records[0].observation_count, 2);
    }

    #[test]
    fn test_trim_is_per_context_and_does_not_touch_input() {
        let filter = OutlierFilter::new(0.25, 3);
        let mut observations = vec![
            obs("A", "MO1", 10.0),
            obs("A", "MO2", 20.0),
            obs("B", "MO3", 30.0),
            obs("B", "MO4", 40.0),
        ];
        // 另一上下文，只有 1 个观测
        let mut lone = obs("A", "MO5", 1000.0);
        lone.routing_name = "Other".to_string();
        observations.push(lone);

        let records = vec![record("A", 15.0, 2), record("B", 35.0, 2)];
        let view = filter.apply(&records, &observations);

        assert_eq!(view.removed_observations, 2);
        let a = view.records.iter().find(|r| r.operator_name == "A").unwrap();
        let b = view.records.iter().find(|r| r.operator_name == "B").unwrap();
        assert_eq!(a.uph, 20.0);
        assert_eq!(b.uph, 30.0);
        assert_eq!(records[0].uph, 15.0);
    }

    #[test]
    fn test_hard_bounds() {
        let filter = OutlierFilter::new(0.0, 3).with_hard_bounds(Some(5.0), Some(50.0));
        let observations = vec![obs("A", "MO1", 1.0), obs("A", "MO2", 20.0), obs("A", "MO3", 80.0)];
        let view = filter.apply(&[record("A", 33.0, 3)], &observations);

        assert_eq!(view.removed_observations, 2);
        assert_eq!(view.records[0].uph, 20.0);
    }
}
