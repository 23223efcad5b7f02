// ==========================================
// UPH 引擎 - 数据质量校验器
// ==========================================
// 阶段 4: 关键字段 + 时长校验
// 规则:
// - 操作员 / 工作中心 / 工艺路线 / 制造订单 任一缺失 → MissingKeyField（该行丢弃）
// - 时长缺失、不可解析、超出区间 → InvalidDuration（该行丢弃，不截断）
// - 拆分碎片允许 0 秒
// - 工单号缺失 → MissingWorkOrder 警告（保留该行）
// ==========================================

use crate::domain::work_cycle::{DqKind, DqLevel, DqViolation, RawWorkCycleRecord};
use crate::engine::duration::DurationNormalizer;
use crate::importer::work_cycle_importer_trait::DqValidator as DqValidatorTrait;

#[derive(Default)]
pub struct DqValidator {
    normalizer: DurationNormalizer,
}

impl DqValidator {
    pub fn new(min_duration_secs: i64, max_duration_secs: i64) -> Self {
        Self {
            normalizer: DurationNormalizer::new(min_duration_secs, max_duration_secs),
        }
    }
}

fn error_violation(
    record: &RawWorkCycleRecord,
    kind: DqKind,
    field: &str,
    message: String,
) -> DqViolation {
    DqViolation {
        row_number: record.row_number,
        cycle_id: record.cycle_id.clone(),
        level: DqLevel::Error,
        kind,
        field: field.to_string(),
        message,
    }
}

impl DqValidatorTrait for DqValidator {
    fn validate_key_fields(&self, record: &RawWorkCycleRecord) -> Vec<DqViolation> {
        let key_fields = [
            ("operator_name", &record.operator_name),
            ("work_center_name", &record.work_center_name),
            ("routing_name", &record.routing_name),
            ("mo_number", &record.mo_number),
        ];

        key_fields
            .iter()
            .filter(|(_, value)| value.is_none())
            .map(|(field, _)| {
                error_violation(
                    record,
                    DqKind::MissingKeyField,
                    field,
                    format!("关键字段缺失: {}", field),
                )
            })
            .collect()
    }

    fn validate_duration(&self, record: &RawWorkCycleRecord) -> Result<i64, DqViolation> {
        let raw = record.duration_raw.as_deref().unwrap_or("");
        self.normalizer
            .normalize_fragment(raw)
            .map_err(|e| error_violation(record, DqKind::InvalidDuration, "duration_raw", e.to_string()))
    }

    fn check_work_order(&self, record: &RawWorkCycleRecord) -> Option<DqViolation> {
        if record.work_order_ref.is_some() {
            return None;
        }
        Some(DqViolation {
            row_number: record.row_number,
            cycle_id: record.cycle_id.clone(),
            level: DqLevel::Warning,
            kind: DqKind::MissingWorkOrder,
            field: "work_order_ref".to_string(),
            message: format!(
                "工单号缺失，同一 MO 与工序下的其他操作员行将被合并: {}",
                record.mo_number.as_deref().unwrap_or("")
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> RawWorkCycleRecord {
        RawWorkCycleRecord {
            operator_name: Some("Gus".to_string()),
            work_center_name: Some("Sewing".to_string()),
            routing_name: Some("Tote".to_string()),
            mo_number: Some("MO100".to_string()),
            duration_raw: Some("0:10:00".to_string()),
            row_number: 3,
            ..Default::default()
        }
    }

    #[test]
    fn test_complete_record_passes() {
        let validator = DqValidator::default();
        let record = complete();
        assert!(validator.validate_key_fields(&record).is_empty());
        assert_eq!(validator.validate_duration(&record).unwrap(), 600);
    }

    #[test]
    fn test_each_missing_key_field_reported() {
        let mut record = complete();
        record.operator_name = None;
        record.routing_name = None;

        let violations = DqValidator::default().validate_key_fields(&record);
        assert_eq!(violations.len(), 2);
        assert!(violations.iter().all(|v| v.kind == DqKind::MissingKeyField));
        assert!(violations.iter().all(|v| v.row_number == 3));
        assert_eq!(violations[0].field, "operator_name");
    }

    #[test]
    fn test_invalid_durations_rejected() {
        let validator = DqValidator::default();
        for raw in [None, Some("abc"), Some("-5"), Some("25:00:00")] {
            let mut record = complete();
            record.duration_raw = raw.map(str::to_string);
            let violation = validator.validate_duration(&record).unwrap_err();
            assert_eq!(violation.kind, DqKind::InvalidDuration);
            assert_eq!(violation.level, DqLevel::Error);
        }
    }

    #[test]
    fn test_missing_work_order_is_warning() {
        let validator = DqValidator::default();
        let violation = validator.check_work_order(&complete()).unwrap();
        assert_eq!(violation.kind, DqKind::MissingWorkOrder);
        assert_eq!(violation.level, DqLevel::Warning);

        let mut record = complete();
        record.work_order_ref = Some("WO1".to_string());
        assert!(validator.check_work_order(&record).is_none());
    }

    #[test]
    fn test_zero_duration_fragment_allowed() {
        let mut record = complete();
        record.duration_raw = Some("0:00:00".to_string());
        assert_eq!(DqValidator::default().validate_duration(&record).unwrap(), 0);
    }
}
