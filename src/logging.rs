// ==========================================
// UPH 引擎 - 日志初始化
// ==========================================
// 工具: tracing + tracing-subscriber（EnvFilter / fmt / json）
// ==========================================

use tracing_subscriber::{fmt, EnvFilter};

/// 默认过滤器（RUST_LOG 未设置时）
const DEFAULT_FILTER: &str = "info,uph_engine=info";

/// 日志输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    /// 从 UPH_ENGINE_LOG_FORMAT 读取（json / text）
    pub fn from_env() -> Self {
        match std::env::var("UPH_ENGINE_LOG_FORMAT") {
            Ok(v) if v.trim().eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

/// 初始化日志系统
///
/// # 环境变量
/// - RUST_LOG: 日志级别过滤器，例如 `RUST_LOG=uph_engine=debug,perf=info`
/// - UPH_ENGINE_LOG_FORMAT: `json` 输出结构化日志，其余为文本
///
/// 日志写到 stderr，stdout 留给 CLI 的 JSON 结果。
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let builder = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_line_number(true);

    let result = match LogFormat::from_env() {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    };
    if let Err(e) = result {
        eprintln!("日志系统已初始化，跳过: {}", e);
    }
}

/// 初始化测试环境的日志系统
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
