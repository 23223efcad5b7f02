// ==========================================
// UPH 引擎 - 工时记录数据仓储
// ==========================================
// 职责: work_cycle 表的读写、损坏标记维护
// 红线: Repository 不含业务逻辑；原始字段入库后只允许纠正性覆盖
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::types::{DataSource, ImportMode, WorkCenter};
use crate::domain::work_cycle::{CorruptionFlag, WorkCycleRecord};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

pub(crate) const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const WORK_CYCLE_COLUMNS: &str = r#"
    cycle_id, operator_name, work_center_raw, work_center, operation_name,
    work_order_ref, mo_number, mo_id, routing_name, duration_raw, duration_secs,
    quantity_done, production_qty, created_at, data_source, batch_id,
    corrupted, corrupted_reason
"#;

/// 单个分块的写入计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertCounts {
    pub inserted: usize,
    pub replaced: usize,
    pub ignored: usize,
}

impl UpsertCounts {
    pub fn merge(&mut self, other: UpsertCounts) {
        self.inserted += other.inserted;
        self.replaced += other.replaced;
        self.ignored += other.ignored;
    }
}

/// 损坏标记统计（按原因类别）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorruptionSummary {
    pub total_cycles: i64,
    pub total_flagged: i64,
    pub by_reason: BTreeMap<String, i64>,
}

// ==========================================
// WorkCycleRepository
// ==========================================
pub struct WorkCycleRepository {
    conn: Arc<Mutex<Connection>>,
}

impl WorkCycleRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 分块写入（单事务）
    pub fn upsert_chunk(
        &self,
        records: &[WorkCycleRecord],
        mode: ImportMode,
    ) -> RepositoryResult<UpsertCounts> {
        let conn = self.get_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        let counts = upsert_cycles_tx(&tx, records, mode)?;
        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(counts)
    }

    /// 读取全部工时（按到达顺序）
    pub fn load_all(&self) -> RepositoryResult<Vec<WorkCycleRecord>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM work_cycle ORDER BY ingest_seq ASC, cycle_id ASC",
            WORK_CYCLE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map([], map_work_cycle_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    pub fn find_by_id(&self, cycle_id: &str) -> RepositoryResult<Option<WorkCycleRecord>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM work_cycle WHERE cycle_id = ?1", WORK_CYCLE_COLUMNS);
        let record = conn
            .query_row(&sql, params![cycle_id], map_work_cycle_row)
            .optional()?;
        Ok(record)
    }

    pub fn count(&self) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let n = conn.query_row("SELECT COUNT(*) FROM work_cycle", [], |row| row.get(0))?;
        Ok(n)
    }

    // ==========================================
    // 损坏标记
    // ==========================================

    /// 标记损坏
    ///
    /// # 返回
    /// - Ok(true): 本次新标记
    /// - Ok(false): 已经是损坏状态（原因保持不变）
    /// - Err(NotFound): 工时不存在
    pub fn flag_corrupted(&self, cycle_id: &str, reason: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let changed = flag_corrupted_tx(&conn, cycle_id, reason)?;
        if changed == 0 && !exists(&conn, cycle_id)? {
            return Err(not_found(cycle_id));
        }
        Ok(changed > 0)
    }

    /// 批量标记（单事务，已损坏的跳过）
    pub fn flag_corrupted_batch<'a, I>(&self, flags: I) -> RepositoryResult<usize>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let conn = self.get_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        let mut changed = 0;
        for (cycle_id, reason) in flags {
            changed += flag_corrupted_tx(&tx, cycle_id, reason)?;
        }
        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(changed)
    }

    pub fn is_corrupted(&self, cycle_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let flag: Option<i64> = conn
            .query_row(
                "SELECT corrupted FROM work_cycle WHERE cycle_id = ?1",
                params![cycle_id],
                |row| row.get(0),
            )
            .optional()?;
        flag.map(|v| v != 0).ok_or_else(|| not_found(cycle_id))
    }

    /// 清除损坏标记（外部纠正工具使用）
    pub fn clear_corruption(&self, cycle_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let changed = conn.execute(
            r#"
            UPDATE work_cycle
            SET corrupted = 0, corrupted_reason = NULL, corrupted_at = NULL
            WHERE cycle_id = ?1 AND corrupted = 1
            "#,
            params![cycle_id],
        )?;
        if changed == 0 && !exists(&conn, cycle_id)? {
            return Err(not_found(cycle_id));
        }
        Ok(changed > 0)
    }

    /// 损坏统计（原因按 ':' 前的类别归并）
    pub fn corruption_summary(&self) -> RepositoryResult<CorruptionSummary> {
        let conn = self.get_conn()?;
        let (total_cycles, total_flagged): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(corrupted), 0) FROM work_cycle",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let mut stmt = conn.prepare(
            r#"
            SELECT COALESCE(corrupted_reason, ''), COUNT(*)
            FROM work_cycle
            WHERE corrupted = 1
            GROUP BY corrupted_reason
            "#,
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut by_reason = BTreeMap::new();
        for (reason, count) in rows {
            let category = reason
                .split(':')
                .next()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or("UNSPECIFIED")
                .to_string();
            *by_reason.entry(category).or_insert(0) += count;
        }

        Ok(CorruptionSummary {
            total_cycles,
            total_flagged,
            by_reason,
        })
    }
}

// ==========================================
// 事务内辅助函数（导入仓储共用）
// ==========================================

/// 在事务中写入工时
///
/// - Append: 以 cycle_id 去重，已存在则忽略
/// - Corrective: 已存在则覆盖原始字段并清除损坏标记，ingest_seq 保持不变
pub(crate) fn upsert_cycles_tx(
    tx: &Transaction,
    records: &[WorkCycleRecord],
    mode: ImportMode,
) -> RepositoryResult<UpsertCounts> {
    let mut next_seq: i64 = tx.query_row(
        "SELECT COALESCE(MAX(ingest_seq), 0) + 1 FROM work_cycle",
        [],
        |row| row.get(0),
    )?;

    let conflict_clause = match mode {
        ImportMode::Append => "ON CONFLICT(cycle_id) DO NOTHING",
        ImportMode::Corrective => {
            r#"ON CONFLICT(cycle_id) DO UPDATE SET
                operator_name = excluded.operator_name,
                work_center_raw = excluded.work_center_raw,
                work_center = excluded.work_center,
                operation_name = excluded.operation_name,
                work_order_ref = excluded.work_order_ref,
                mo_number = excluded.mo_number,
                mo_id = excluded.mo_id,
                routing_name = excluded.routing_name,
                duration_raw = excluded.duration_raw,
                duration_secs = excluded.duration_secs,
                quantity_done = excluded.quantity_done,
                production_qty = excluded.production_qty,
                created_at = excluded.created_at,
                data_source = excluded.data_source,
                batch_id = excluded.batch_id,
                corrupted = 0,
                corrupted_reason = NULL,
                corrupted_at = NULL"#
        }
    };

    let sql = format!(
        r#"
        INSERT INTO work_cycle (
            cycle_id, operator_name, work_center_raw, work_center, operation_name,
            work_order_ref, mo_number, mo_id, routing_name, duration_raw, duration_secs,
            quantity_done, production_qty, created_at, data_source, batch_id,
            ingest_seq, corrupted, corrupted_reason, corrupted_at
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
            ?17, 0, NULL, NULL
        )
        {}
        "#,
        conflict_clause
    );

    let mut exists_stmt = tx.prepare("SELECT 1 FROM work_cycle WHERE cycle_id = ?1")?;
    let mut stmt = tx.prepare(&sql)?;
    let mut counts = UpsertCounts::default();

    for record in records {
        let existed = exists_stmt
            .query_row(params![record.cycle_id], |_| Ok(()))
            .optional()?
            .is_some();

        let changed = stmt.execute(params![
            record.cycle_id,
            record.operator_name,
            record.work_center_raw,
            record.work_center.to_db_str(),
            record.operation_name,
            record.work_order_ref,
            record.mo_number,
            record.mo_id,
            record.routing_name,
            record.duration_raw,
            record.duration_secs,
            record.quantity_done,
            record.production_qty,
            record.created_at.map(|d| d.format(DATETIME_FORMAT).to_string()),
            record.data_source.to_db_str(),
            record.batch_id,
            next_seq,
        ])?;

        match (existed, changed) {
            (false, _) => {
                counts.inserted += 1;
                next_seq += 1;
            }
            (true, 0) => counts.ignored += 1,
            (true, _) => counts.replaced += 1,
        }
    }

    Ok(counts)
}

fn flag_corrupted_tx(conn: &Connection, cycle_id: &str, reason: &str) -> RepositoryResult<usize> {
    let changed = conn.execute(
        r#"
        UPDATE work_cycle
        SET corrupted = 1, corrupted_reason = ?2, corrupted_at = ?3
        WHERE cycle_id = ?1 AND corrupted = 0
        "#,
        params![cycle_id, reason, Utc::now().to_rfc3339()],
    )?;
    Ok(changed)
}

fn exists(conn: &Connection, cycle_id: &str) -> RepositoryResult<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM work_cycle WHERE cycle_id = ?1",
            params![cycle_id],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

fn not_found(cycle_id: &str) -> RepositoryError {
    RepositoryError::NotFound {
        entity: "WorkCycle".to_string(),
        id: cycle_id.to_string(),
    }
}

fn map_work_cycle_row(row: &Row) -> rusqlite::Result<WorkCycleRecord> {
    let work_center: String = row.get(3)?;
    let created_at: Option<String> = row.get(13)?;
    let data_source: String = row.get(14)?;
    let corrupted: i64 = row.get(16)?;
    let reason: Option<String> = row.get(17)?;

    Ok(WorkCycleRecord {
        cycle_id: row.get(0)?,
        operator_name: row.get(1)?,
        work_center_raw: row.get(2)?,
        work_center: WorkCenter::from_db_str(&work_center),
        operation_name: row.get(4)?,
        work_order_ref: row.get(5)?,
        mo_number: row.get(6)?,
        mo_id: row.get(7)?,
        routing_name: row.get(8)?,
        duration_raw: row.get(9)?,
        duration_secs: row.get(10)?,
        quantity_done: row.get(11)?,
        production_qty: row.get(12)?,
        created_at: created_at
            .and_then(|s| NaiveDateTime::parse_from_str(&s, DATETIME_FORMAT).ok()),
        data_source: DataSource::from_db_str(&data_source),
        batch_id: row.get(15)?,
        corruption: CorruptionFlag {
            corrupted: corrupted != 0,
            reason,
        },
    })
}
