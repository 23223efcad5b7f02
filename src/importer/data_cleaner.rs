// ==========================================
// UPH 引擎 - 数据清洗器
// ==========================================
// 阶段 2: TRIM / 空白合并 / NULL 标准化 / 数量清洗
// 说明: 清洗不改变语义，只消除导出格式噪声；分组键依赖清洗后的文本
// ==========================================

use crate::importer::work_cycle_importer_trait::DataCleaner as DataCleanerTrait;

/// 视为缺失的占位文本
const NULL_TOKENS: &[&str] = &["null", "none", "n/a", "na", "-"];

pub struct DataCleaner;

impl DataCleanerTrait for DataCleaner {
    fn clean_text(&self, value: &str) -> String {
        value.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn normalize_null(&self, value: Option<String>) -> Option<String> {
        value.and_then(|v| {
            let cleaned = self.clean_text(&v);
            if cleaned.is_empty() || NULL_TOKENS.iter().any(|t| cleaned.eq_ignore_ascii_case(t)) {
                None
            } else {
                Some(cleaned)
            }
        })
    }

    fn clean_quantity(&self, value: Option<f64>) -> Option<f64> {
        value.filter(|q| q.is_finite() && *q >= 0.0)
    }
}
