// ==========================================
// UPH 引擎 - 工时记录领域模型
// ==========================================
// 职责: 原始工时行 / 合并工时 / 损坏标记 / 导入批次与 DQ 报告
// 红线: 原始记录入库后不可变，唯一可变属性为损坏标记
// ==========================================

use crate::domain::types::{DataSource, WorkCenter};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// RawWorkCycleRecord - 字段映射后的中间结构
// ==========================================
// 用途: 导入管道阶段 1 产物，尚未校验
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawWorkCycleRecord {
    pub cycle_id: Option<String>,          // 工时记录 ID（ERP 导出可能缺失）
    pub operator_name: Option<String>,     // 操作员
    pub work_center_name: Option<String>,  // 工作中心（原始文本）
    pub operation_name: Option<String>,    // 工序名称
    pub work_order_ref: Option<String>,    // 工单号
    pub mo_number: Option<String>,         // 制造订单号（如 MO100）
    pub mo_id: Option<String>,             // 制造订单内部 ID
    pub routing_name: Option<String>,      // 工艺路线
    pub duration_raw: Option<String>,      // 时长原始值（秒 或 H:MM:SS）
    pub quantity_done: Option<f64>,        // 工时行完成数量（不可靠）
    pub production_qty: Option<f64>,       // 生产订单数量（权威，可空）
    pub created_at: Option<NaiveDateTime>, // 创建时间

    // ===== 元信息 =====
    pub row_number: usize, // 原始文件行号（DQ 报告用）
}

// ==========================================
// CorruptionFlag - 损坏标记
// ==========================================
// 一旦设置即排除出所有聚合，直到纠正性重导入清除
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorruptionFlag {
    pub corrupted: bool,
    pub reason: Option<String>,
}

impl CorruptionFlag {
    pub fn clean() -> Self {
        Self::default()
    }

    pub fn flagged(reason: impl Into<String>) -> Self {
        Self {
            corrupted: true,
            reason: Some(reason.into()),
        }
    }
}

// ==========================================
// WorkCycleRecord - 工时记录
// ==========================================
// 对齐: work_cycle 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkCycleRecord {
    // ===== 主键 =====
    pub cycle_id: String,

    // ===== 归属维度 =====
    pub operator_name: String,
    pub work_center_raw: String,   // 原始工作中心名称
    pub work_center: WorkCenter,   // 派生：标准工作中心
    pub operation_name: String,
    pub work_order_ref: Option<String>,
    pub mo_number: String,
    pub mo_id: String,
    pub routing_name: String,

    // ===== 计量 =====
    pub duration_raw: String,
    pub duration_secs: i64,              // 归一化秒数（拆分碎片可为 0）
    pub quantity_done: Option<f64>,
    pub production_qty: Option<f64>,

    // ===== 审计 =====
    pub created_at: Option<NaiveDateTime>,
    pub data_source: DataSource,
    pub batch_id: Option<String>,

    // ===== 唯一可变属性 =====
    pub corruption: CorruptionFlag,
}

impl WorkCycleRecord {
    /// 合并分组键: (制造订单 ID, 工序, 工单)
    pub fn consolidation_key(&self) -> ConsolidationKey {
        ConsolidationKey {
            mo_id: self.mo_id.clone(),
            operation_name: self.operation_name.clone(),
            work_order_ref: self.work_order_ref.clone().unwrap_or_default(),
        }
    }
}

/// 合并分组键
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConsolidationKey {
    pub mo_id: String,
    pub operation_name: String,
    pub work_order_ref: String,
}

// ==========================================
// ConsolidatedCycle - 合并后的逻辑工时
// ==========================================
// 不变量: duration_secs = 各成员时长之和；quantity 取首个正数量，绝不累加
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolidatedCycle {
    pub key: ConsolidationKey,
    pub operator_name: String,
    pub work_center: WorkCenter,
    pub operation_name: String,
    pub routing_name: String,
    pub mo_number: String,
    pub mo_id: String,
    pub duration_secs: i64,
    pub quantity: Option<f64>,        // 首个正数量成员的数量
    pub production_qty: Option<f64>,  // 首个非空的权威生产订单数量
    pub member_cycle_ids: Vec<String>, // 按到达顺序
    pub corruption: CorruptionFlag,
}

impl ConsolidatedCycle {
    pub fn duration_hours(&self) -> f64 {
        self.duration_secs as f64 / 3600.0
    }
}

// ==========================================
// ImportBatch - 导入批次
// ==========================================
// 对齐: import_batch 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportBatch {
    pub batch_id: String,
    pub file_name: Option<String>,
    pub data_source: DataSource,
    pub total_rows: i64,
    pub inserted_rows: i64,   // 新写入
    pub replaced_rows: i64,   // 纠正性覆盖
    pub skipped_rows: i64,    // DQ 阻断（时长非法/关键字段缺失）
    pub duplicate_rows: i64,  // 同批次重复 或 已存在被忽略
    pub imported_at: DateTime<Utc>,
    pub elapsed_ms: i64,
    pub dq_report_json: Option<String>,
}

// ==========================================
// DQ 违规
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DqLevel {
    Error,     // 阻断（该行丢弃并计数）
    Warning,   // 警告（允许导入）
    Info,      // 提示（仅记录）
    Duplicate, // 重复（该行跳过）
}

/// 违规分类，与引擎错误分类一一对应
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DqKind {
    InvalidDuration,
    MissingKeyField,
    InvalidNumber,
    DuplicateCycle,
    ZeroDurationFragment,
    MissingWorkOrder,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DqViolation {
    pub row_number: usize,
    pub cycle_id: Option<String>,
    pub level: DqLevel,
    pub kind: DqKind,
    pub field: String,
    pub message: String,
}

// ==========================================
// 导入汇总
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DqSummary {
    pub total_rows: usize,
    pub inserted: usize,
    pub replaced: usize,
    pub ignored_existing: usize,
    pub invalid_duration: usize,
    pub missing_key_field: usize,
    pub invalid_number: usize,
    pub duplicate_in_batch: usize,
    /// 缺少工单号的行（仍导入，仅警告）
    #[serde(default)]
    pub missing_work_order: usize,
}

impl DqSummary {
    /// DQ 阻断行数（被丢弃的非法行）
    pub fn skipped(&self) -> usize {
        self.invalid_duration + self.missing_key_field + self.invalid_number
    }
}

/// 单次导入结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportReport {
    pub batch: ImportBatch,
    pub summary: DqSummary,
    pub violations: Vec<DqViolation>,
}
