// ==========================================
// UPH 引擎 - 工时导入 Repository Trait
// ==========================================
// 职责: 定义导入相关数据访问接口（不包含业务逻辑）
// 红线: Repository 不含业务规则，只做数据 CRUD
// ==========================================

use crate::domain::types::ImportMode;
use crate::domain::work_cycle::{ImportBatch, WorkCycleRecord};
use crate::repository::work_cycle_repo::UpsertCounts;
use async_trait::async_trait;
use std::error::Error;

// ==========================================
// WorkCycleImportRepository Trait
// ==========================================
// 实现者: WorkCycleImportRepositoryImpl（使用 rusqlite）
#[async_trait]
pub trait WorkCycleImportRepository: Send + Sync {
    /// 写入一个分块（单事务）
    ///
    /// # 返回
    /// - Ok(UpsertCounts): 新增 / 覆盖 / 忽略计数
    /// - Err: 数据库错误（仅该分块回滚，之前的分块已提交）
    async fn batch_upsert_cycles(
        &self,
        records: Vec<WorkCycleRecord>,
        mode: ImportMode,
    ) -> Result<UpsertCounts, Box<dyn Error>>;

    /// 写入导入批次日志
    async fn insert_batch(&self, batch: ImportBatch) -> Result<(), Box<dyn Error>>;

    /// 最近的导入批次（按导入时间倒序）
    async fn get_recent_batches(&self, limit: usize) -> Result<Vec<ImportBatch>, Box<dyn Error>>;

    /// 批量检查已存在的工时 ID
    async fn batch_check_exists(
        &self,
        cycle_ids: Vec<String>,
    ) -> Result<Vec<String>, Box<dyn Error>>;

    /// 工时总数
    async fn count_cycles(&self) -> Result<usize, Box<dyn Error>>;
}
