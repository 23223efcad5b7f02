// ==========================================
// UPH 引擎 - 性能统计
// ==========================================
// 职责: 统计导入/重算各阶段的耗时、SQL 语句数、慢 SQL 数
// 输出: tracing target = "perf" / "slow_sql"
// ==========================================

use rusqlite::Connection;
use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// 开关环境变量
pub const PERF_SQL_ENV: &str = "UPH_ENGINE_PERF_SQL";
/// 慢 SQL 阈值环境变量（毫秒）
pub const SLOW_SQL_MS_ENV: &str = "UPH_ENGINE_SLOW_SQL_MS";

static SQL_TRACING_ENABLED: AtomicBool = AtomicBool::new(false);
static SLOW_SQL_MS: AtomicU64 = AtomicU64::new(0);

thread_local! {
    static ACTIVE_GUARDS: Cell<u32> = const { Cell::new(0) };
    static SQL_COUNT: Cell<u64> = const { Cell::new(0) };
    static SLOW_SQL_COUNT: Cell<u64> = const { Cell::new(0) };
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name).ok().map(|v| {
        matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

/// 安装 SQLite trace/profile 回调
///
/// - Debug 构建默认开启，Release 默认关闭
/// - `UPH_ENGINE_PERF_SQL=1` 强制开启
/// - `UPH_ENGINE_SLOW_SQL_MS=100` 设置慢 SQL 阈值
pub fn install_sqlite_tracing(conn: &mut Connection) {
    let enabled = env_flag(PERF_SQL_ENV).unwrap_or(cfg!(debug_assertions));
    SQL_TRACING_ENABLED.store(enabled, Ordering::Relaxed);

    if !enabled {
        conn.trace(None);
        conn.profile(None);
        return;
    }

    let slow_ms = std::env::var(SLOW_SQL_MS_ENV)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(100);
    SLOW_SQL_MS.store(slow_ms, Ordering::Relaxed);

    conn.trace(Some(on_sql_trace));
    conn.profile(Some(on_sql_profile));
}

fn guard_active() -> bool {
    ACTIVE_GUARDS.with(|d| d.get() > 0)
}

fn on_sql_trace(_sql: &str) {
    if SQL_TRACING_ENABLED.load(Ordering::Relaxed) && guard_active() {
        SQL_COUNT.with(|c| c.set(c.get().saturating_add(1)));
    }
}

fn on_sql_profile(sql: &str, duration: Duration) {
    if !SQL_TRACING_ENABLED.load(Ordering::Relaxed) {
        return;
    }
    let ms = duration.as_millis() as u64;
    let threshold = SLOW_SQL_MS.load(Ordering::Relaxed);
    if threshold == 0 || ms < threshold {
        return;
    }

    let mut statement: String = sql.split_whitespace().collect::<Vec<_>>().join(" ");
    if statement.chars().count() > 300 {
        statement = statement.chars().take(300).collect::<String>() + "...";
    }
    tracing::warn!(target: "slow_sql", duration_ms = ms, sql = %statement, "slow sql");

    if guard_active() {
        SLOW_SQL_COUNT.with(|c| c.set(c.get().saturating_add(1)));
    }
}

/// 阶段计时 Guard，Drop 时输出一行 perf 日志
///
/// ```ignore
/// let _perf = uph_engine::perf::PerfGuard::new("recalculate");
/// ```
pub struct PerfGuard {
    op: &'static str,
    started: Instant,
    sql_base: u64,
    slow_sql_base: u64,
    rows: Option<usize>,
}

impl PerfGuard {
    pub fn new(op: &'static str) -> Self {
        ACTIVE_GUARDS.with(|d| d.set(d.get().saturating_add(1)));
        Self {
            op,
            started: Instant::now(),
            sql_base: SQL_COUNT.with(|c| c.get()),
            slow_sql_base: SLOW_SQL_COUNT.with(|c| c.get()),
            rows: None,
        }
    }

    /// 记录本阶段处理的行数
    pub fn set_rows(&mut self, rows: usize) {
        self.rows = Some(rows);
    }

    pub fn elapsed_ms(&self) -> i64 {
        self.started.elapsed().as_millis() as i64
    }
}

impl Drop for PerfGuard {
    fn drop(&mut self) {
        let sql_count = SQL_COUNT.with(|c| c.get()).saturating_sub(self.sql_base);
        let slow_sql_count = SLOW_SQL_COUNT
            .with(|c| c.get())
            .saturating_sub(self.slow_sql_base);

        tracing::info!(
            target: "perf",
            op = self.op,
            elapsed_ms = self.elapsed_ms(),
            rows = self.rows,
            sql_count,
            slow_sql_count,
            "done"
        );

        ACTIVE_GUARDS.with(|d| d.set(d.get().saturating_sub(1)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_depth_restored() {
        {
            let mut guard = PerfGuard::new("outer");
            guard.set_rows(3);
            let _inner = PerfGuard::new("inner");
            assert!(guard_active());
        }
        assert!(!guard_active());
    }
}
