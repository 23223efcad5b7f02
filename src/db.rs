// ==========================================
// UPH 引擎 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 幂等建表（work_cycle / operator_performance / performance_observation / recalc_run / import_batch / config_kv）
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要"每个连接"单独开启
/// - busy_timeout 需要"每个连接"单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 幂等初始化 schema
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS import_batch (
            batch_id TEXT PRIMARY KEY,
            file_name TEXT,
            data_source TEXT NOT NULL,
            total_rows INTEGER NOT NULL DEFAULT 0,
            inserted_rows INTEGER NOT NULL DEFAULT 0,
            replaced_rows INTEGER NOT NULL DEFAULT 0,
            skipped_rows INTEGER NOT NULL DEFAULT 0,
            duplicate_rows INTEGER NOT NULL DEFAULT 0,
            imported_at TEXT NOT NULL,
            elapsed_ms INTEGER NOT NULL DEFAULT 0,
            dq_report_json TEXT
        );

        CREATE TABLE IF NOT EXISTS work_cycle (
            cycle_id TEXT PRIMARY KEY,
            operator_name TEXT NOT NULL,
            work_center_raw TEXT NOT NULL,
            work_center TEXT NOT NULL,
            operation_name TEXT NOT NULL,
            work_order_ref TEXT,
            mo_number TEXT NOT NULL,
            mo_id TEXT NOT NULL,
            routing_name TEXT NOT NULL,
            duration_raw TEXT NOT NULL,
            duration_secs INTEGER NOT NULL,
            quantity_done REAL,
            production_qty REAL,
            created_at TEXT,
            data_source TEXT NOT NULL,
            batch_id TEXT,
            ingest_seq INTEGER NOT NULL DEFAULT 0,
            corrupted INTEGER NOT NULL DEFAULT 0,
            corrupted_reason TEXT,
            corrupted_at TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_work_cycle_mo
            ON work_cycle(mo_id, operation_name, work_order_ref);
        CREATE INDEX IF NOT EXISTS idx_work_cycle_corrupted
            ON work_cycle(corrupted);

        CREATE TABLE IF NOT EXISTS operator_performance (
            operator_name TEXT NOT NULL,
            work_center TEXT NOT NULL,
            routing_name TEXT NOT NULL,
            uph REAL NOT NULL,
            observation_count INTEGER NOT NULL,
            operations TEXT NOT NULL,
            data_source TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (operator_name, work_center, routing_name)
        );

        CREATE TABLE IF NOT EXISTS performance_observation (
            operator_name TEXT NOT NULL,
            work_center TEXT NOT NULL,
            routing_name TEXT NOT NULL,
            mo_number TEXT NOT NULL,
            uph REAL NOT NULL,
            duration_secs INTEGER NOT NULL,
            quantity REAL NOT NULL,
            PRIMARY KEY (operator_name, work_center, routing_name, mo_number)
        );

        CREATE TABLE IF NOT EXISTS recalc_run (
            run_id TEXT PRIMARY KEY,
            status TEXT NOT NULL DEFAULT 'RUNNING',
            started_at TEXT NOT NULL,
            finished_at TEXT,
            record_count INTEGER NOT NULL DEFAULT 0,
            summary_json TEXT,
            error_message TEXT,
            config_snapshot_json TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_recalc_run_started
            ON recalc_run(started_at DESC);
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;

    Ok(())
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), None);

        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();

        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));
    }
}
