// ==========================================
// UPH 引擎 - 操作员绩效数据仓储
// ==========================================
// 职责: operator_performance / performance_observation 表
// 红线: 快照整体替换（同一事务内先删后插），从不增量修补
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::performance::{
    MoObservation, OperatorPerformanceRecord, Page, PerformanceFilter, PerformanceKey,
};
use crate::domain::types::WorkCenter;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

// ==========================================
// OperatorPerformanceRepository
// ==========================================
pub struct OperatorPerformanceRepository {
    conn: Arc<Mutex<Connection>>,
}

impl OperatorPerformanceRepository {
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

    /// 原子替换绩效快照
    ///
    /// 任一插入失败则整体回滚，旧快照保持不变。
    pub fn replace_snapshot(
        &self,
        records: &[OperatorPerformanceRecord],
        observations: &[MoObservation],
    ) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        tx.execute("DELETE FROM operator_performance", [])?;
        tx.execute("DELETE FROM performance_observation", [])?;

        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO operator_performance (
                    operator_name, work_center, routing_name, uph,
                    observation_count, operations, data_source, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )?;
            for record in records {
                let operations = serde_json::to_string(&record.operations)?;
                stmt.execute(params![
                    record.operator_name,
                    record.work_center.to_db_str(),
                    record.routing_name,
                    record.uph,
                    record.observation_count,
                    operations,
                    record.data_source,
                    record.updated_at.to_rfc3339(),
                ])?;
            }

            let mut stmt = tx.prepare(
                r#"
                INSERT INTO performance_observation (
                    operator_name, work_center, routing_name, mo_number,
                    uph, duration_secs, quantity
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )?;
            for obs in observations {
                stmt.execute(params![
                    obs.operator_name,
                    obs.work_center.to_db_str(),
                    obs.routing_name,
                    obs.mo_number,
                    obs.uph,
                    obs.duration_secs,
                    obs.quantity,
                ])?;
            }
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(records.len())
    }

    pub fn find(&self, key: &PerformanceKey) -> RepositoryResult<Option<OperatorPerformanceRecord>> {
        let conn = self.get_conn()?;
        let record = conn
            .query_row(
                r#"
                SELECT operator_name, work_center, routing_name, uph,
                       observation_count, operations, data_source, updated_at
                FROM operator_performance
                WHERE operator_name = ?1 AND work_center = ?2 AND routing_name = ?3
                "#,
                params![key.operator_name, key.work_center.to_db_str(), key.routing_name],
                map_performance_row,
            )
            .optional()?;
        Ok(record)
    }

    /// 分页查询（按操作员、工作中心、工艺路线排序）
    pub fn list(
        &self,
        filter: &PerformanceFilter,
        page: Page,
    ) -> RepositoryResult<Vec<OperatorPerformanceRecord>> {
        let conn = self.get_conn()?;
        let (where_clause, mut values) = build_filter(filter);
        values.push(Value::Integer(page.limit as i64));
        values.push(Value::Integer(page.offset as i64));

        let sql = format!(
            r#"
            SELECT operator_name, work_center, routing_name, uph,
                   observation_count, operations, data_source, updated_at
            FROM operator_performance
            {}
            ORDER BY operator_name, work_center, routing_name
            LIMIT ? OFFSET ?
            "#,
            where_clause
        );
        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map(params_from_iter(values), map_performance_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    /// 不分页的全量查询（估算回退使用）
    pub fn list_all(&self) -> RepositoryResult<Vec<OperatorPerformanceRecord>> {
        self.list(
            &PerformanceFilter::default(),
            Page {
                offset: 0,
                limit: i64::MAX as usize,
            },
        )
    }

    pub fn count(&self, filter: &PerformanceFilter) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let (where_clause, values) = build_filter(filter);
        let sql = format!("SELECT COUNT(*) FROM operator_performance {}", where_clause);
        let n = conn.query_row(&sql, params_from_iter(values), |row| row.get(0))?;
        Ok(n)
    }

    /// 单 MO 观测（离群过滤视图的素材）
    pub fn list_observations(&self, filter: &PerformanceFilter) -> RepositoryResult<Vec<MoObservation>> {
        let conn = self.get_conn()?;
        let (where_clause, values) = build_filter(filter);
        let sql = format!(
            r#"
            SELECT operator_name, work_center, routing_name, mo_number,
                   uph, duration_secs, quantity
            FROM performance_observation
            {}
            ORDER BY operator_name, work_center, routing_name, mo_number
            "#,
            where_clause
        );
        let mut stmt = conn.prepare(&sql)?;
        let observations = stmt
            .query_map(params_from_iter(values), |row| {
                let work_center: String = row.get(1)?;
                Ok(MoObservation {
                    operator_name: row.get(0)?,
                    work_center: WorkCenter::from_db_str(&work_center),
                    routing_name: row.get(2)?,
                    mo_number: row.get(3)?,
                    uph: row.get(4)?,
                    duration_secs: row.get(5)?,
                    quantity: row.get(6)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(observations)
    }
}

fn build_filter(filter: &PerformanceFilter) -> (String, Vec<Value>) {
    let mut clauses = Vec::new();
    let mut values = Vec::new();

    if let Some(routing) = &filter.routing_name {
        clauses.push("routing_name = ?");
        values.push(Value::Text(routing.clone()));
    }
    if let Some(work_center) = filter.work_center {
        clauses.push("work_center = ?");
        values.push(Value::Text(work_center.to_db_str().to_string()));
    }
    if let Some(operator) = &filter.operator_name {
        clauses.push("operator_name = ?");
        values.push(Value::Text(operator.clone()));
    }

    if clauses.is_empty() {
        (String::new(), values)
    } else {
        (format!("WHERE {}", clauses.join(" AND ")), values)
    }
}

fn map_performance_row(row: &Row) -> rusqlite::Result<OperatorPerformanceRecord> {
    let work_center: String = row.get(1)?;
    let operations: String = row.get(5)?;
    let updated_at: String = row.get(7)?;

    Ok(OperatorPerformanceRecord {
        operator_name: row.get(0)?,
        work_center: WorkCenter::from_db_str(&work_center),
        routing_name: row.get(2)?,
        uph: row.get(3)?,
        observation_count: row.get(4)?,
        operations: serde_json::from_str::<BTreeSet<String>>(&operations).unwrap_or_default(),
        data_source: row.get(6)?,
        updated_at: DateTime::parse_from_rfc3339(&updated_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_default(),
    })
}
