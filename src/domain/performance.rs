// ==========================================
// UPH 引擎 - 绩效领域模型
// ==========================================
// 职责: 制造订单聚合 / 操作员绩效 / 估算绩效
// 红线: 估算值只在读时产生，绝不写入权威绩效表
// ==========================================

use crate::domain::types::WorkCenter;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ==========================================
// PerformanceKey - 绩效主键
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PerformanceKey {
    pub operator_name: String,
    pub work_center: WorkCenter,
    pub routing_name: String,
}

impl PerformanceKey {
    pub fn new(operator_name: &str, work_center: WorkCenter, routing_name: &str) -> Self {
        Self {
            operator_name: operator_name.trim().to_string(),
            work_center,
            routing_name: routing_name.trim().to_string(),
        }
    }
}

// ==========================================
// ManufacturingOrderAggregate - 制造订单聚合
// ==========================================
// 键: (operator, work_center, routing, mo_number)
// 不变量: quantity 每个 MO 只取一次，绝不跨工时累加
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManufacturingOrderAggregate {
    pub operator_name: String,
    pub work_center: WorkCenter,
    pub routing_name: String,
    pub mo_number: String,
    pub duration_secs: i64,
    pub quantity: f64,
    pub quantity_source: QuantitySource,
    pub operations: BTreeSet<String>,
    pub cycle_count: usize,
}

/// 产量来源（审计用）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuantitySource {
    ProductionOrder, // 权威生产订单数量
    CycleQuantity,   // 回退：合并工时数量
}

impl ManufacturingOrderAggregate {
    pub fn key(&self) -> PerformanceKey {
        PerformanceKey {
            operator_name: self.operator_name.clone(),
            work_center: self.work_center,
            routing_name: self.routing_name.clone(),
        }
    }

    pub fn duration_hours(&self) -> f64 {
        self.duration_secs as f64 / 3600.0
    }

    /// 单 MO UPH = 数量 / 小时
    pub fn uph(&self) -> f64 {
        if self.duration_secs <= 0 {
            return 0.0;
        }
        self.quantity / self.duration_hours()
    }
}

// ==========================================
// MoObservation - 单 MO 观测值
// ==========================================
// 对齐: performance_observation 表（离群过滤的原始素材）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoObservation {
    pub operator_name: String,
    pub work_center: WorkCenter,
    pub routing_name: String,
    pub mo_number: String,
    pub uph: f64,
    pub duration_secs: i64,
    pub quantity: f64,
}

impl MoObservation {
    pub fn key(&self) -> PerformanceKey {
        PerformanceKey {
            operator_name: self.operator_name.clone(),
            work_center: self.work_center,
            routing_name: self.routing_name.clone(),
        }
    }
}

// ==========================================
// OperatorPerformanceRecord - 操作员绩效
// ==========================================
// 对齐: operator_performance 表
// uph = 单 MO UPH 的算术平均（不是总量/总时长）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorPerformanceRecord {
    pub operator_name: String,
    pub work_center: WorkCenter,
    pub routing_name: String,
    pub uph: f64,
    pub observation_count: i64,
    pub operations: BTreeSet<String>,
    pub data_source: String,
    pub updated_at: DateTime<Utc>,
}

impl OperatorPerformanceRecord {
    pub fn key(&self) -> PerformanceKey {
        PerformanceKey {
            operator_name: self.operator_name.clone(),
            work_center: self.work_center,
            routing_name: self.routing_name.clone(),
        }
    }
}

// ==========================================
// EstimatedPerformanceRecord - 估算绩效
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimatedPerformanceRecord {
    pub operator_name: String,
    pub work_center: WorkCenter,
    pub routing_name: String,
    pub uph: f64,
    pub basis_observation_count: i64, // 参与估算的观测数
    pub source_reason: String,        // 可读的来源说明
    pub is_estimated: bool,           // 恒为 true
}

// ==========================================
// PerformanceLookup - 读时查询结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PerformanceLookup {
    Observed(OperatorPerformanceRecord),
    Estimated(EstimatedPerformanceRecord),
    NotFound,
}

impl PerformanceLookup {
    /// 取 UPH（未找到返回 None）
    pub fn uph(&self) -> Option<f64> {
        match self {
            PerformanceLookup::Observed(r) => Some(r.uph),
            PerformanceLookup::Estimated(r) => Some(r.uph),
            PerformanceLookup::NotFound => None,
        }
    }

    pub fn is_estimated(&self) -> bool {
        matches!(self, PerformanceLookup::Estimated(_))
    }
}

// ==========================================
// 查询过滤与分页
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceFilter {
    pub routing_name: Option<String>,
    pub work_center: Option<WorkCenter>,
    pub operator_name: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Page {
    pub offset: usize,
    pub limit: usize,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 100,
        }
    }
}
