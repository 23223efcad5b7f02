// ==========================================
// UPH 引擎 - 工作中心分类器
// ==========================================
// 职责: 将自由文本的工作中心/工序名称映射到固定标准集合
// 规则: 关键字子串匹配，大小写不敏感，按表顺序首个命中
// 红线: 未命中归入默认类别，绝不阻断导入
// ==========================================

use crate::domain::types::WorkCenter;

/// 分类规则（关键字 → 标准工作中心）
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationRule {
    pub keyword: String,
    pub work_center: WorkCenter,
}

impl ClassificationRule {
    pub fn new(keyword: &str, work_center: WorkCenter) -> Self {
        Self {
            keyword: keyword.to_lowercase(),
            work_center,
        }
    }
}

/// 默认分类表
const DEFAULT_RULES: &[(&str, WorkCenter)] = &[
    ("sewing", WorkCenter::Assembly),
    ("rope", WorkCenter::Assembly),
    ("assembl", WorkCenter::Assembly),
    ("cutting", WorkCenter::Cutting),
    ("packaging", WorkCenter::Packaging),
    ("packing", WorkCenter::Packaging),
];

/// 分类结果（带命中关键字，便于发现覆盖缺口）
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub work_center: WorkCenter,
    pub matched_keyword: Option<String>,
}

impl Classification {
    pub fn is_default(&self) -> bool {
        self.matched_keyword.is_none()
    }
}

// ==========================================
// WorkCenterClassifier
// ==========================================
#[derive(Debug, Clone)]
pub struct WorkCenterClassifier {
    rules: Vec<ClassificationRule>,
    default: WorkCenter,
}

impl Default for WorkCenterClassifier {
    fn default() -> Self {
        Self {
            rules: DEFAULT_RULES
                .iter()
                .map(|(kw, wc)| ClassificationRule::new(kw, *wc))
                .collect(),
            default: WorkCenter::Other,
        }
    }
}

impl WorkCenterClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用自定义规则表
    pub fn with_rules(rules: Vec<ClassificationRule>, default: WorkCenter) -> Self {
        Self { rules, default }
    }

    pub fn rules(&self) -> &[ClassificationRule] {
        &self.rules
    }

    /// 分类单个名称
    pub fn classify_name(&self, name: &str) -> Classification {
        let lowered = name.to_lowercase();
        self.rules
            .iter()
            .find(|rule| lowered.contains(&rule.keyword))
            .map(|rule| Classification {
                work_center: rule.work_center,
                matched_keyword: Some(rule.keyword.clone()),
            })
            .unwrap_or(Classification {
                work_center: self.default,
                matched_keyword: None,
            })
    }

    /// 先按工作中心名称分类，未命中再按工序名称
    pub fn classify(&self, work_center_name: &str, operation_name: &str) -> Classification {
        let by_center = self.classify_name(work_center_name);
        if !by_center.is_default() {
            return by_center;
        }
        self.classify_name(operation_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table() {
        let classifier = WorkCenterClassifier::new();
        assert_eq!(classifier.classify_name("Sewing Line 2").work_center, WorkCenter::Assembly);
        assert_eq!(classifier.classify_name("ROPE braiding").work_center, WorkCenter::Assembly);
        assert_eq!(classifier.classify_name("Laser Cutting").work_center, WorkCenter::Cutting);
        assert_eq!(classifier.classify_name("Final packaging").work_center, WorkCenter::Packaging);
    }

    #[test]
    fn test_unmatched_falls_back_to_default() {
        let classifier = WorkCenterClassifier::new();
        let c = classifier.classify_name("Quality Inspection");
        assert_eq!(c.work_center, WorkCenter::Other);
        assert!(c.is_default());
    }

    #[test]
    fn test_operation_used_when_center_unmatched() {
        let classifier = WorkCenterClassifier::new();
        let c = classifier.classify("Station 4", "Sewing straps");
        assert_eq!(c.work_center, WorkCenter::Assembly);
        assert_eq!(c.matched_keyword.as_deref(), Some("sewing"));

        // 工作中心命中时优先
        let c = classifier.classify("Cutting Table", "Sewing straps");
        assert_eq!(c.work_center, WorkCenter::Cutting);
    }

    #[test]
    fn test_custom_rules() {
        let classifier = WorkCenterClassifier::with_rules(
            vec![ClassificationRule::new("Weld", WorkCenter::Assembly)],
            WorkCenter::Packaging,
        );
        assert_eq!(classifier.classify_name("welding").work_center, WorkCenter::Assembly);
        assert_eq!(classifier.classify_name("boxing").work_center, WorkCenter::Packaging);
    }
}
