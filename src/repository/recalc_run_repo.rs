// ==========================================
// UPH 引擎 - 重算运行日志仓储
// ==========================================
// 职责: recalc_run 表（RUNNING → SUCCEEDED | FAILED）
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::run::RecalcRun;
use crate::domain::types::RunStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const RUN_COLUMNS: &str = r#"
    run_id, status, started_at, finished_at, record_count,
    summary_json, error_message, config_snapshot_json
"#;

pub struct RecalcRunRepository {
    conn: Arc<Mutex<Connection>>,
}

impl RecalcRunRepository {
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

    /// 登记一次运行（RUNNING）
    pub fn insert_running(
        &self,
        run_id: &str,
        started_at: DateTime<Utc>,
        config_snapshot_json: Option<&str>,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO recalc_run (run_id, status, started_at, config_snapshot_json)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                run_id,
                RunStatus::Running.to_db_str(),
                started_at.to_rfc3339(),
                config_snapshot_json,
            ],
        )?;
        Ok(())
    }

    /// 结束一次运行
    pub fn finish(
        &self,
        run_id: &str,
        status: RunStatus,
        record_count: i64,
        summary_json: Option<&str>,
        error_message: Option<&str>,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let changed = conn.execute(
            r#"
            UPDATE recalc_run
            SET status = ?2, finished_at = ?3, record_count = ?4,
                summary_json = ?5, error_message = ?6
            WHERE run_id = ?1
            "#,
            params![
                run_id,
                status.to_db_str(),
                Utc::now().to_rfc3339(),
                record_count,
                summary_json,
                error_message,
            ],
        )?;
        if changed == 0 {
            return Err(RepositoryError::NotFound {
                entity: "RecalcRun".to_string(),
                id: run_id.to_string(),
            });
        }
        Ok(())
    }

    /// 将遗留的 RUNNING 记录（进程异常退出）标记为 FAILED
    pub fn fail_stale_running(&self, reason: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let changed = conn.execute(
            r#"
            UPDATE recalc_run
            SET status = ?1, finished_at = ?2, error_message = ?3
            WHERE status = ?4
            "#,
            params![
                RunStatus::Failed.to_db_str(),
                Utc::now().to_rfc3339(),
                reason,
                RunStatus::Running.to_db_str(),
            ],
        )?;
        Ok(changed)
    }

    pub fn find(&self, run_id: &str) -> RepositoryResult<Option<RecalcRun>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM recalc_run WHERE run_id = ?1", RUN_COLUMNS);
        let run = conn.query_row(&sql, params![run_id], map_run_row).optional()?;
        Ok(run)
    }

    pub fn latest(&self) -> RepositoryResult<Option<RecalcRun>> {
        Ok(self.list_recent(1)?.into_iter().next())
    }

    pub fn list_recent(&self, limit: usize) -> RepositoryResult<Vec<RecalcRun>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM recalc_run ORDER BY started_at DESC, rowid DESC LIMIT ?1",
            RUN_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let runs = stmt
            .query_map(params![limit as i64], map_run_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(runs)
    }
}

fn parse_ts(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn map_run_row(row: &Row) -> rusqlite::Result<RecalcRun> {
    let status: String = row.get(1)?;
    let started_at: String = row.get(2)?;
    let finished_at: Option<String> = row.get(3)?;

    Ok(RecalcRun {
        run_id: row.get(0)?,
        status: RunStatus::from_db_str(&status),
        started_at: parse_ts(&started_at).unwrap_or_default(),
        finished_at: finished_at.as_deref().and_then(parse_ts),
        record_count: row.get(4)?,
        summary_json: row.get(5)?,
        error_message: row.get(6)?,
        config_snapshot_json: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;

    fn repo() -> RecalcRunRepository {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        RecalcRunRepository::from_connection(Arc::new(Mutex::new(conn)))
    }

    #[test]
    fn test_run_lifecycle() {
        let repo = repo();
        repo.insert_running("r1", Utc::now(), Some("{}")).unwrap();
        assert_eq!(repo.latest().unwrap().unwrap().status, RunStatus::Running);

        repo.finish("r1", RunStatus::Succeeded, 5, Some("{}"), None).unwrap();
        let run = repo.find("r1").unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Succeeded);
        assert_eq!(run.record_count, 5);
        assert!(run.finished_at.is_some());
    }

    #[test]
    fn test_stale_running_marked_failed() {
        let repo = repo();
        repo.insert_running("r1", Utc::now(), None).unwrap();
        assert_eq!(repo.fail_stale_running("restart").unwrap(), 1);
        let run = repo.find("r1").unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.error_message.as_deref(), Some("restart"));
    }

    #[test]
    fn test_finish_unknown_run() {
        let repo = repo();
        assert!(matches!(
            repo.finish("nope", RunStatus::Failed, 0, None, None),
            Err(RepositoryError::NotFound { .. })
        ));
    }
}
