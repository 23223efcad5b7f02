// ==========================================
// UPH 引擎 - 领域类型定义
// ==========================================
// 职责: 标准工作中心、重算状态、数据来源、导入模式
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 标准工作中心 (Canonical Work Center)
// ==========================================
// 上游命名不统一，所有原始名称经分类器映射到此固定集合
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkCenter {
    Cutting,   // 裁剪
    Assembly,  // 组装（缝纫/绳编）
    Packaging, // 包装
    Other,     // 未匹配（默认类别）
}

impl fmt::Display for WorkCenter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkCenter::Cutting => write!(f, "CUTTING"),
            WorkCenter::Assembly => write!(f, "ASSEMBLY"),
            WorkCenter::Packaging => write!(f, "PACKAGING"),
            WorkCenter::Other => write!(f, "OTHER"),
        }
    }
}

impl WorkCenter {
    /// 全部标准工作中心（用于配置默认值/报表遍历）
    pub const ALL: [WorkCenter; 4] = [
        WorkCenter::Cutting,
        WorkCenter::Assembly,
        WorkCenter::Packaging,
        WorkCenter::Other,
    ];

    /// 从数据库字符串解析（大小写不敏感，未知值归入 Other）
    pub fn from_db_str(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "CUTTING" => WorkCenter::Cutting,
            "ASSEMBLY" => WorkCenter::Assembly,
            "PACKAGING" => WorkCenter::Packaging,
            _ => WorkCenter::Other,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            WorkCenter::Cutting => "CUTTING",
            WorkCenter::Assembly => "ASSEMBLY",
            WorkCenter::Packaging => "PACKAGING",
            WorkCenter::Other => "OTHER",
        }
    }
}

// ==========================================
// 重算状态 (Recalculation Run Status)
// ==========================================
// 状态机: Idle → Running → (Succeeded | Failed)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Idle,      // 空闲
    Running,   // 运行中（同一时刻至多一个）
    Succeeded, // 成功（快照已原子替换）
    Failed,    // 失败（旧快照保持不变）
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}

impl RunStatus {
    pub fn from_db_str(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "RUNNING" => RunStatus::Running,
            "SUCCEEDED" => RunStatus::Succeeded,
            "FAILED" => RunStatus::Failed,
            _ => RunStatus::Idle,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            RunStatus::Idle => "IDLE",
            RunStatus::Running => "RUNNING",
            RunStatus::Succeeded => "SUCCEEDED",
            RunStatus::Failed => "FAILED",
        }
    }

    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Succeeded | RunStatus::Failed)
    }
}

// ==========================================
// 数据来源 (Data Source)
// ==========================================
// 引擎不关心来源，仅用于审计/展示
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataSource {
    CsvImport,   // CSV 批量导入
    ExcelImport, // Excel 批量导入
    ErpApi,      // ERP 接口拉取
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}

impl DataSource {
    pub fn from_db_str(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "EXCEL_IMPORT" => DataSource::ExcelImport,
            "ERP_API" => DataSource::ErpApi,
            _ => DataSource::CsvImport,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            DataSource::CsvImport => "CSV_IMPORT",
            DataSource::ExcelImport => "EXCEL_IMPORT",
            DataSource::ErpApi => "ERP_API",
        }
    }
}

// ==========================================
// 导入模式 (Import Mode)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportMode {
    /// 追加：按 cycle_id 幂等写入，已存在则忽略
    #[default]
    Append,
    /// 纠正性重导入：覆盖已存在记录并清除其损坏标记
    Corrective,
}

impl fmt::Display for ImportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportMode::Append => write!(f, "APPEND"),
            ImportMode::Corrective => write!(f, "CORRECTIVE"),
        }
    }
}
