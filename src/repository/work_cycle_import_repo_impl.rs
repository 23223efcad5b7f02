// ==========================================
// UPH 引擎 - 工时导入 Repository 实现
// ==========================================
// 职责: 实现导入相关数据访问（使用 rusqlite）
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::types::{DataSource, ImportMode};
use crate::domain::work_cycle::{ImportBatch, WorkCycleRecord};
use crate::repository::work_cycle_import_repo::WorkCycleImportRepository;
use crate::repository::work_cycle_repo::{upsert_cycles_tx, UpsertCounts};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::error::Error;
use std::sync::{Arc, Mutex};

// ==========================================
// WorkCycleImportRepositoryImpl
// ==========================================
pub struct WorkCycleImportRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl WorkCycleImportRepositoryImpl {
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl WorkCycleImportRepository for WorkCycleImportRepositoryImpl {
    async fn batch_upsert_cycles(
        &self,
        records: Vec<WorkCycleRecord>,
        mode: ImportMode,
    ) -> Result<UpsertCounts, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        let tx = conn.unchecked_transaction()?;

        let counts = upsert_cycles_tx(&tx, &records, mode)?;

        tx.commit()?;
        Ok(counts)
    }

    async fn insert_batch(&self, batch: ImportBatch) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        conn.execute(
            r#"
            INSERT INTO import_batch (
                batch_id, file_name, data_source,
                total_rows, inserted_rows, replaced_rows, skipped_rows, duplicate_rows,
                imported_at, elapsed_ms, dq_report_json
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                batch.batch_id,
                batch.file_name,
                batch.data_source.to_db_str(),
                batch.total_rows,
                batch.inserted_rows,
                batch.replaced_rows,
                batch.skipped_rows,
                batch.duplicate_rows,
                batch.imported_at.to_rfc3339(),
                batch.elapsed_ms,
                batch.dq_report_json,
            ],
        )?;

        Ok(())
    }

    async fn get_recent_batches(&self, limit: usize) -> Result<Vec<ImportBatch>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt = conn.prepare(
            r#"
            SELECT batch_id, file_name, data_source,
                   total_rows, inserted_rows, replaced_rows, skipped_rows, duplicate_rows,
                   imported_at, elapsed_ms, dq_report_json
            FROM import_batch
            ORDER BY imported_at DESC
            LIMIT ?1
            "#,
        )?;

        let batches = stmt
            .query_map(params![limit as i64], |row| {
                let data_source: String = row.get(2)?;
                let imported_at: String = row.get(8)?;
                Ok(ImportBatch {
                    batch_id: row.get(0)?,
                    file_name: row.get(1)?,
                    data_source: DataSource::from_db_str(&data_source),
                    total_rows: row.get(3)?,
                    inserted_rows: row.get(4)?,
                    replaced_rows: row.get(5)?,
                    skipped_rows: row.get(6)?,
                    duplicate_rows: row.get(7)?,
                    imported_at: DateTime::parse_from_rfc3339(&imported_at)
                        .map(|dt| dt.with_timezone(&Utc))
                        .unwrap_or_default(),
                    elapsed_ms: row.get(9)?,
                    dq_report_json: row.get(10)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(batches)
    }

    async fn batch_check_exists(
        &self,
        cycle_ids: Vec<String>,
    ) -> Result<Vec<String>, Box<dyn Error>> {
        if cycle_ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let placeholders = cycle_ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let query = format!(
            "SELECT cycle_id FROM work_cycle WHERE cycle_id IN ({})",
            placeholders
        );
        let mut stmt = conn.prepare(&query)?;

        let params: Vec<&dyn rusqlite::ToSql> = cycle_ids
            .iter()
            .map(|id| id as &dyn rusqlite::ToSql)
            .collect();

        let existing_ids = stmt
            .query_map(params.as_slice(), |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(existing_ids)
    }

    async fn count_cycles(&self) -> Result<usize, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM work_cycle", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
