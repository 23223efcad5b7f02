// ==========================================
// UPH 引擎 - 工时导入 Trait
// ==========================================
// 职责: 定义工时导入接口（不包含实现）
// 管道: 解析 → 映射 → 清洗 → 时长归一化 → 工作中心分类
//       → DQ 校验 → 重复检测 → 分块写入
// ==========================================

use crate::domain::types::{DataSource, ImportMode};
use crate::domain::work_cycle::{DqViolation, ImportReport, RawWorkCycleRecord};
use async_trait::async_trait;
use std::collections::HashMap;
use std::error::Error;
use std::path::Path;

// ==========================================
// WorkCycleImporter Trait
// ==========================================
// 用途: 工时导入主接口
// 实现者: WorkCycleImporterImpl
#[async_trait]
pub trait WorkCycleImporter: Send + Sync {
    /// 从文件导入工时（按扩展名选择 CSV / Excel）
    ///
    /// # 返回
    /// - Ok(ImportReport): 批次信息 + DQ 汇总 + 违规明细
    /// - Err: 文件读取错误、数据库错误等（已提交的分块不回滚）
    async fn import_from_file<P: AsRef<Path> + Send>(
        &self,
        file_path: P,
        mode: ImportMode,
    ) -> Result<ImportReport, Box<dyn Error>>;

    /// 导入已取回的行（ERP 拉取等）
    ///
    /// 与文件导入共用映射之后的全部阶段
    async fn import_rows(
        &self,
        rows: Vec<RawWorkCycleRecord>,
        source: DataSource,
        mode: ImportMode,
    ) -> Result<ImportReport, Box<dyn Error>>;

    /// 批量导入多个文件（并发执行）
    ///
    /// # 说明
    /// - 每个文件独立成批，某个文件失败不影响其他文件
    async fn batch_import<P: AsRef<Path> + Send + Sync>(
        &self,
        file_paths: Vec<P>,
        mode: ImportMode,
    ) -> Result<Vec<Result<ImportReport, String>>, Box<dyn Error>>;
}

// ==========================================
// FileParser Trait
// ==========================================
// 用途: 文件解析接口（阶段 0）
// 实现者: CsvParser, ExcelParser
pub trait FileParser: Send + Sync {
    /// 解析文件为原始行记录（HashMap<列名, 值>）
    fn parse_to_raw_records(
        &self,
        file_path: &Path,
    ) -> Result<Vec<HashMap<String, String>>, Box<dyn Error>>;
}

// ==========================================
// FieldMapper Trait
// ==========================================
// 用途: 字段映射接口（阶段 1）
pub trait FieldMapper: Send + Sync {
    /// 将原始行记录映射为 RawWorkCycleRecord
    ///
    /// 数值列无法解析时返回 Err，由调用方记为 InvalidNumber 并跳过该行
    fn map_to_raw_cycle(
        &self,
        row: HashMap<String, String>,
        row_number: usize,
    ) -> Result<RawWorkCycleRecord, Box<dyn Error>>;
}

// ==========================================
// DataCleaner Trait
// ==========================================
// 用途: 数据清洗接口（阶段 2）
pub trait DataCleaner: Send + Sync {
    /// 清洗文本字段（TRIM + 合并内部空白）
    fn clean_text(&self, value: &str) -> String;

    /// 标准化 NULL 值（空字符串 / "null" / "N/A" → None）
    fn normalize_null(&self, value: Option<String>) -> Option<String>;

    /// 清洗数量（负数、NaN 视为缺失）
    fn clean_quantity(&self, value: Option<f64>) -> Option<f64>;

    /// 清洗整条记录（文本字段 NULL 标准化 + 数量清洗）
    fn clean_record(&self, record: &mut RawWorkCycleRecord) {
        for field in [
            &mut record.cycle_id,
            &mut record.operator_name,
            &mut record.work_center_name,
            &mut record.operation_name,
            &mut record.work_order_ref,
            &mut record.mo_number,
            &mut record.mo_id,
            &mut record.routing_name,
            &mut record.duration_raw,
        ] {
            *field = self.normalize_null(field.take());
        }

        record.quantity_done = self.clean_quantity(record.quantity_done);
        record.production_qty = self.clean_quantity(record.production_qty);
    }
}

// ==========================================
// DqValidator Trait
// ==========================================
// 用途: 数据质量校验接口（阶段 4）
pub trait DqValidator: Send + Sync {
    /// 关键字段校验（操作员 / 工作中心 / 工艺路线 / 制造订单）
    fn validate_key_fields(&self, record: &RawWorkCycleRecord) -> Vec<DqViolation>;

    /// 时长校验
    ///
    /// # 返回
    /// - Ok(secs): 归一化秒数（拆分碎片允许为 0）
    /// - Err(violation): InvalidDuration
    fn validate_duration(&self, record: &RawWorkCycleRecord) -> Result<i64, DqViolation>;

    /// 工单号检查（仅警告）
    ///
    /// 工单号缺失时同一 MO + 工序下不同操作员的行会被合并为一个周期
    fn check_work_order(&self, record: &RawWorkCycleRecord) -> Option<DqViolation>;
}

// ==========================================
// ConflictHandler Trait
// ==========================================
// 用途: 重复检测接口（阶段 5）
pub trait ConflictHandler: Send + Sync {
    /// 检测同批次内重复的 cycle_id
    ///
    /// # 返回
    /// - Vec<(row_number, cycle_id)>: 首次出现之后的重复行
    fn detect_duplicates(&self, records: &[(usize, String)]) -> Vec<(usize, String)>;

    /// 检测库中已存在的 cycle_id（跨批次）
    ///
    /// # 参数
    /// - existing_ids: 数据库中已存在的 cycle_id
    fn detect_existing(
        &self,
        records: &[(usize, String)],
        existing_ids: &[String],
    ) -> Vec<(usize, String)>;
}
