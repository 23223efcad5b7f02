// ==========================================
// UPH 引擎 - 字段映射器
// ==========================================
// 阶段 1: 源列名 → 标准字段 + 类型转换
// 说明: ERP 导出的列名随版本变化，每个标准字段维护一组别名
// ==========================================

use crate::domain::work_cycle::RawWorkCycleRecord;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::work_cycle_importer_trait::FieldMapper as FieldMapperTrait;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashMap;

// ===== 标准字段 → 列名别名 =====
const CYCLE_ID: &[&str] = &["ID", "Cycle ID", "Work Cycle ID"];
const DURATION: &[&str] = &["Duration", "Duration (HH:MM:SS)", "Duration (Seconds)"];
const OPERATOR: &[&str] = &["Employee", "Operator", "Employee Name"];
const WORK_CENTER: &[&str] = &["Work Center", "Workcenter", "Work Center Name"];
const OPERATION: &[&str] = &["Operation", "Operation Name"];
const WORK_ORDER: &[&str] = &["Work Order", "Work Order Ref"];
const MO_NUMBER: &[&str] = &["Manufacturing Order", "MO", "MO Number"];
const MO_ID: &[&str] = &["Manufacturing Order ID", "MO ID"];
const ROUTING: &[&str] = &["Routing", "Routing Name"];
const QUANTITY_DONE: &[&str] = &["Quantity Done", "Qty Done", "Quantity"];
const PRODUCTION_QTY: &[&str] = &["Production Quantity", "Production Qty", "MO Quantity"];
const CREATED_AT: &[&str] = &["Created on", "Start Date", "Created At", "Date"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

pub struct FieldMapper;

impl FieldMapperTrait for FieldMapper {
    fn map_to_raw_cycle(
        &self,
        row: HashMap<String, String>,
        row_number: usize,
    ) -> Result<RawWorkCycleRecord, Box<dyn std::error::Error>> {
        let mo_number = self.get_string(&row, MO_NUMBER);
        // 导出缺少 MO ID 列时以 MO 编号代替
        let mo_id = self.get_string(&row, MO_ID).or_else(|| mo_number.clone());

        Ok(RawWorkCycleRecord {
            cycle_id: self.get_string(&row, CYCLE_ID),
            operator_name: self.get_string(&row, OPERATOR),
            work_center_name: self.get_string(&row, WORK_CENTER),
            operation_name: self.get_string(&row, OPERATION),
            work_order_ref: self.get_string(&row, WORK_ORDER),
            mo_number,
            mo_id,
            routing_name: self.get_string(&row, ROUTING),
            duration_raw: self.get_string(&row, DURATION),
            quantity_done: self.parse_f64(&row, QUANTITY_DONE, row_number)?,
            production_qty: self.parse_f64(&row, PRODUCTION_QTY, row_number)?,
            created_at: self.parse_datetime(&row, CREATED_AT),
            row_number,
        })
    }
}

impl FieldMapper {
    /// 按别名顺序取第一个非空值；列名大小写不敏感
    fn get_string(&self, row: &HashMap<String, String>, aliases: &[&str]) -> Option<String> {
        for alias in aliases {
            let value = row.get(*alias).or_else(|| {
                row.iter()
                    .find(|(header, _)| header.eq_ignore_ascii_case(alias))
                    .map(|(_, v)| v)
            });
            if let Some(v) = value {
                let trimmed = v.trim();
                if !trimmed.is_empty() {
                    return Some(trimmed.to_string());
                }
            }
        }
        None
    }

    /// 解析数量（容忍千分位逗号）
    fn parse_f64(
        &self,
        row: &HashMap<String, String>,
        aliases: &[&str],
        row_number: usize,
    ) -> ImportResult<Option<f64>> {
        let Some(value) = self.get_string(row, aliases) else {
            return Ok(None);
        };
        let normalized = value.replace(',', "");
        match normalized.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(Some(v)),
            _ => Err(ImportError::FieldMappingError {
                row: row_number,
                message: format!("{} 无法解析为数值: {}", aliases[0], value),
            }),
        }
    }

    /// 解析创建时间；仅用于审计，无法识别的格式按缺失处理
    fn parse_datetime(
        &self,
        row: &HashMap<String, String>,
        aliases: &[&str],
    ) -> Option<NaiveDateTime> {
        let value = self.get_string(row, aliases)?;

        DATETIME_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(&value, fmt).ok())
            .or_else(|| {
                DATE_FORMATS
                    .iter()
                    .find_map(|fmt| NaiveDate::parse_from_str(&value, fmt).ok())
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_maps_erp_export_headers() {
        let record = FieldMapper
            .map_to_raw_cycle(
                row(&[
                    ("Duration (HH:MM:SS)", "0:10:00"),
                    ("Employee", " Gus "),
                    ("Work Center", "Sewing"),
                    ("Operation", "Assembly"),
                    ("Manufacturing Order", "MO100"),
                    ("Manufacturing Order ID", "4411"),
                    ("Routing", "Tote"),
                    ("Qty Done", "20"),
                    ("Created on", "2024-03-01 08:15:00"),
                ]),
                2,
            )
            .unwrap();

        assert_eq!(record.duration_raw.as_deref(), Some("0:10:00"));
        assert_eq!(record.operator_name.as_deref(), Some("Gus"));
        assert_eq!(record.mo_number.as_deref(), Some("MO100"));
        assert_eq!(record.mo_id.as_deref(), Some("4411"));
        assert_eq!(record.quantity_done, Some(20.0));
        assert_eq!(record.production_qty, None);
        assert!(record.created_at.is_some());
        assert_eq!(record.row_number, 2);
    }

    #[test]
    fn test_mo_id_falls_back_to_mo_number() {
        let record = FieldMapper
            .map_to_raw_cycle(row(&[("MO", "MO7"), ("operator", "Ana")]), 1)
            .unwrap();
        assert_eq!(record.mo_id.as_deref(), Some("MO7"));
        assert_eq!(record.operator_name.as_deref(), Some("Ana"));
    }

    #[test]
    fn test_quantity_with_thousands_separator() {
        let record = FieldMapper
            .map_to_raw_cycle(row(&[("Production Quantity", "1,200")]), 1)
            .unwrap();
        assert_eq!(record.production_qty, Some(1200.0));
    }

    #[test]
    fn test_invalid_quantity_is_error() {
        let result = FieldMapper.map_to_raw_cycle(row(&[("Quantity Done", "lots")]), 5);
        assert!(result.is_err());
    }

    #[test]
    fn test_unrecognised_date_is_none() {
        let record = FieldMapper
            .map_to_raw_cycle(row(&[("Start Date", "yesterday")]), 1)
            .unwrap();
        assert!(record.created_at.is_none());

        let record = FieldMapper
            .map_to_raw_cycle(row(&[("Start Date", "03/01/2024")]), 1)
            .unwrap();
        assert_eq!(
            record.created_at,
            NaiveDate::from_ymd_opt(2024, 3, 1).and_then(|d| d.and_hms_opt(0, 0, 0))
        );
    }
}
