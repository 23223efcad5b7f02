// ==========================================
// UPH 引擎 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和 API 实例
// 说明: 所有仓储共享同一个连接；重算运行状态由 RecalcEngine 实例持有
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::{ImportApi, PerformanceApi};
use crate::config::config_manager::ConfigManager;
use crate::db::{init_schema, open_sqlite_connection};
use crate::engine::recalc::RecalcEngine;
use crate::perf::install_sqlite_tracing;
use crate::repository::{OperatorPerformanceRepository, RecalcRunRepository, WorkCycleRepository};

/// 数据库路径环境变量
pub const DB_PATH_ENV: &str = "UPH_ENGINE_DB_PATH";

/// 应用状态
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 绩效 API（重算 / 查询 / 损坏标记）
    pub performance_api: Arc<PerformanceApi>,

    /// 工时导入 API
    pub import_api: Arc<ImportApi>,

    /// 配置管理器（阈值读写）
    pub config_manager: Arc<ConfigManager>,

    /// 重算引擎（供轮询状态 / 取消）
    pub recalc_engine: Arc<RecalcEngine>,
}

impl AppState {
    /// 创建 AppState
    ///
    /// # 说明
    /// 1. 打开共享连接并幂等建表
    /// 2. 将上次进程遗留的 RUNNING 运行日志收尾为 FAILED
    /// 3. 装配仓储、引擎与 API
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!(db_path = %db_path, "初始化 AppState");

        let mut conn =
            open_sqlite_connection(&db_path).map_err(|e| format!("无法打开数据库: {}", e))?;
        init_schema(&conn).map_err(|e| format!("数据库建表失败: {}", e))?;
        install_sqlite_tracing(&mut conn);
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 初始化 Repository 层
        // ==========================================
        let cycle_repo = Arc::new(WorkCycleRepository::from_connection(conn.clone()));
        let performance_repo = Arc::new(OperatorPerformanceRepository::from_connection(conn.clone()));
        let run_repo = Arc::new(RecalcRunRepository::from_connection(conn.clone()));

        match run_repo.fail_stale_running("进程退出时重算未完成") {
            Ok(0) => {}
            Ok(n) => tracing::warn!(count = n, "遗留的 RUNNING 运行日志已标记为 FAILED"),
            Err(e) => tracing::warn!(error = %e, "遗留运行日志收尾失败（将继续启动）"),
        }

        // ==========================================
        // 初始化 Engine 层
        // ==========================================
        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );
        let recalc_engine = Arc::new(RecalcEngine::new(
            cycle_repo.clone(),
            performance_repo.clone(),
            run_repo.clone(),
            config_manager.clone(),
        ));

        // ==========================================
        // 初始化 API 层
        // ==========================================
        let performance_api = Arc::new(PerformanceApi::new(
            recalc_engine.clone(),
            performance_repo,
            cycle_repo,
            run_repo,
            config_manager.clone(),
        ));
        let import_api = Arc::new(ImportApi::new(conn, config_manager.clone()));

        tracing::info!("AppState 初始化完成");

        Ok(Self {
            db_path,
            performance_api,
            import_api,
            config_manager,
            recalc_engine,
        })
    }
}

/// 获取默认数据库路径
///
/// 优先级: 环境变量 UPH_ENGINE_DB_PATH → 用户数据目录 → 当前目录
pub fn get_default_db_path() -> String {
    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    match dirs::data_dir() {
        Some(data_dir) => {
            let dir = data_dir.join("uph-engine");
            // 目录创建失败时退回当前目录
            if std::fs::create_dir_all(&dir).is_err() {
                return "./uph_engine.db".to_string();
            }
            dir.join("uph_engine.db").to_string_lossy().to_string()
        }
        None => "./uph_engine.db".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_app_state_bootstraps_empty_database() {
        let temp = NamedTempFile::new().unwrap();
        let db_path = temp.path().to_string_lossy().to_string();

        let state = AppState::new(db_path.clone()).unwrap();
        assert_eq!(state.db_path, db_path);
        assert!(!state.recalc_engine.is_running());
        assert!(state.performance_api.latest_run().unwrap().is_none());

        // 二次打开同一个库（建表幂等）
        assert!(AppState::new(db_path).is_ok());
    }
}
