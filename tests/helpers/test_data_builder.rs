// ==========================================
// 测试数据构建器 - 用于集成测试
// ==========================================

#![allow(dead_code)]

use uph_engine::domain::work_cycle::{CorruptionFlag, RawWorkCycleRecord, WorkCycleRecord};
use uph_engine::{DataSource, WorkCenter};

// ==========================================
// WorkCycleRecord 构建器
// ==========================================
// 默认值: Gus / Sewing(ASSEMBLY) / Tote / MO100 / 600 秒 / 数量 20

pub struct WorkCycleBuilder {
    record: WorkCycleRecord,
}

impl WorkCycleBuilder {
    pub fn new(cycle_id: &str) -> Self {
        Self {
            record: WorkCycleRecord {
                cycle_id: cycle_id.to_string(),
                operator_name: "Gus".to_string(),
                work_center_raw: "Sewing".to_string(),
                work_center: WorkCenter::Assembly,
                operation_name: "Assembly".to_string(),
                work_order_ref: None,
                mo_number: "MO100".to_string(),
                mo_id: "MO100".to_string(),
                routing_name: "Tote".to_string(),
                duration_raw: "600".to_string(),
                duration_secs: 600,
                quantity_done: Some(20.0),
                production_qty: None,
                created_at: None,
                data_source: DataSource::CsvImport,
                batch_id: None,
                corruption: CorruptionFlag::clean(),
            },
        }
    }

    pub fn operator(mut self, name: &str) -> Self {
        self.record.operator_name = name.to_string();
        self
    }

    pub fn work_center(mut self, raw: &str, work_center: WorkCenter) -> Self {
        self.record.work_center_raw = raw.to_string();
        self.record.work_center = work_center;
        self
    }

    pub fn operation(mut self, name: &str) -> Self {
        self.record.operation_name = name.to_string();
        self
    }

    pub fn work_order(mut self, work_order: &str) -> Self {
        self.record.work_order_ref = Some(work_order.to_string());
        self
    }

    /// 同时设置 MO 编号与 MO ID
    pub fn mo(mut self, mo: &str) -> Self {
        self.record.mo_number = mo.to_string();
        self.record.mo_id = mo.to_string();
        self
    }

    pub fn routing(mut self, routing: &str) -> Self {
        self.record.routing_name = routing.to_string();
        self
    }

    pub fn duration_secs(mut self, secs: i64) -> Self {
        self.record.duration_raw = secs.to_string();
        self.record.duration_secs = secs;
        self
    }

    pub fn quantity(mut self, qty: Option<f64>) -> Self {
        self.record.quantity_done = qty;
        self
    }

    pub fn production_qty(mut self, qty: f64) -> Self {
        self.record.production_qty = Some(qty);
        self
    }

    pub fn build(self) -> WorkCycleRecord {
        self.record
    }
}

// ==========================================
// ERP 行构建
// ==========================================

/// 构建一条无 ID 的 ERP 行（ID 由导入器派生）
pub fn erp_row(operator: &str, mo: &str, duration: &str, qty: f64) -> RawWorkCycleRecord {
    RawWorkCycleRecord {
        cycle_id: None,
        operator_name: Some(operator.to_string()),
        work_center_name: Some("Sewing Line 1".to_string()),
        operation_name: Some("Assembly".to_string()),
        work_order_ref: Some(format!("WO-{}", mo)),
        mo_number: Some(mo.to_string()),
        mo_id: Some(mo.to_string()),
        routing_name: Some("Tote".to_string()),
        duration_raw: Some(duration.to_string()),
        quantity_done: Some(qty),
        production_qty: None,
        created_at: None,
        row_number: 0,
    }
}
