// ==========================================
// UPH 引擎 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::engine_config::{self, EngineConfig};
use crate::config::import_config_trait::ImportConfigReader;
use crate::db::open_sqlite_connection;
use crate::domain::types::WorkCenter;
use async_trait::async_trait;
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::error::Error;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

// ==========================================
// 配置键
// ==========================================
pub mod config_keys {
    pub const HARD_CAP_HOURS: &str = "uph.hard_cap_hours";
    pub const CONTEXT_CEILINGS_JSON: &str = "uph.context_ceilings_json";
    pub const MIN_MO_DURATION_SECS: &str = "uph.min_mo_duration_secs";
    pub const MAX_UPH: &str = "uph.max_uph";
    pub const OUTLIER_TRIM_PCT: &str = "uph.outlier_trim_pct";
    pub const OUTLIER_MIN_GROUP_SIZE: &str = "uph.outlier_min_group_size";
    pub const MIN_DURATION_SECS: &str = "uph.min_duration_secs";
    pub const MAX_DURATION_SECS: &str = "uph.max_duration_secs";
    pub const IMPORT_CHUNK_SIZE: &str = "import.chunk_size";
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 的配置值（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value, updated_at)
             VALUES ('global', ?1, ?2, datetime('now'))
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// 读取并解析数值配置；缺失或格式错误时回落默认值
    fn get_parsed_or_default<T>(&self, key: &str, default: T) -> Result<T, Box<dyn Error>>
    where
        T: FromStr + Copy + std::fmt::Display,
    {
        match self.get_config_value(key)? {
            None => Ok(default),
            Some(raw) => match raw.trim().parse::<T>() {
                Ok(v) => Ok(v),
                Err(_) => {
                    tracing::warn!(
                        config_key = key,
                        raw_value = %raw,
                        default = %default,
                        "配置值格式错误，使用默认值"
                    );
                    Ok(default)
                }
            },
        }
    }

    /// 获取所有配置的快照（JSON格式）
    ///
    /// # 用途
    /// - 每次重算记录配置快照，便于追溯阈值变化
    pub fn get_config_snapshot(&self) -> Result<String, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let mut config_map: HashMap<String, String> = HashMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        let json_value = json!(config_map);
        Ok(serde_json::to_string(&json_value)?)
    }

    // ===== 引擎阈值 =====

    /// 获取各工作中心"小时/件"上限
    ///
    /// # 说明
    /// 配置格式为 JSON: {"ASSEMBLY": 2.0, "CUTTING": 1.5}
    /// 格式错误时回落默认（仅 ASSEMBLY=2.0）
    pub fn get_context_ceilings(&self) -> Result<BTreeMap<WorkCenter, f64>, Box<dyn Error>> {
        let defaults = EngineConfig::default().context_ceilings;
        let raw = match self.get_config_value(config_keys::CONTEXT_CEILINGS_JSON)? {
            Some(v) => v,
            None => return Ok(defaults),
        };

        let parsed: BTreeMap<String, f64> = match serde_json::from_str(&raw) {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(
                    config_key = config_keys::CONTEXT_CEILINGS_JSON,
                    raw_value = %raw,
                    "上下文阈值配置格式错误，使用默认配置"
                );
                return Ok(defaults);
            }
        };

        Ok(parsed
            .into_iter()
            .filter(|(_, hours)| *hours > 0.0)
            .map(|(wc, hours)| (WorkCenter::from_db_str(&wc), hours))
            .collect())
    }

    /// 加载完整引擎配置
    pub fn load_engine_config(&self) -> Result<EngineConfig, Box<dyn Error>> {
        Ok(EngineConfig {
            hard_cap_hours: self.get_parsed_or_default(
                config_keys::HARD_CAP_HOURS,
                engine_config::DEFAULT_HARD_CAP_HOURS,
            )?,
            context_ceilings: self.get_context_ceilings()?,
            min_mo_duration_secs: self.get_parsed_or_default(
                config_keys::MIN_MO_DURATION_SECS,
                engine_config::DEFAULT_MIN_MO_DURATION_SECS,
            )?,
            max_uph: self
                .get_parsed_or_default(config_keys::MAX_UPH, engine_config::DEFAULT_MAX_UPH)?,
            outlier_trim_pct: self.get_parsed_or_default(
                config_keys::OUTLIER_TRIM_PCT,
                engine_config::DEFAULT_OUTLIER_TRIM_PCT,
            )?,
            outlier_min_group_size: self.get_parsed_or_default(
                config_keys::OUTLIER_MIN_GROUP_SIZE,
                engine_config::DEFAULT_OUTLIER_MIN_GROUP_SIZE,
            )?,
            min_duration_secs: self.get_parsed_or_default(
                config_keys::MIN_DURATION_SECS,
                engine_config::DEFAULT_MIN_DURATION_SECS,
            )?,
            max_duration_secs: self.get_parsed_or_default(
                config_keys::MAX_DURATION_SECS,
                engine_config::DEFAULT_MAX_DURATION_SECS,
            )?,
            import_chunk_size: self.get_parsed_or_default(
                config_keys::IMPORT_CHUNK_SIZE,
                engine_config::DEFAULT_IMPORT_CHUNK_SIZE,
            )?,
        })
    }
}

// ==========================================
// ImportConfigReader Trait 实现
// ==========================================
#[async_trait]
impl ImportConfigReader for ConfigManager {
    async fn get_import_chunk_size(&self) -> Result<usize, Box<dyn Error>> {
        let size = self.get_parsed_or_default(
            config_keys::IMPORT_CHUNK_SIZE,
            engine_config::DEFAULT_IMPORT_CHUNK_SIZE,
        )?;
        Ok(size.max(1))
    }

    async fn get_min_duration_secs(&self) -> Result<i64, Box<dyn Error>> {
        self.get_parsed_or_default(
            config_keys::MIN_DURATION_SECS,
            engine_config::DEFAULT_MIN_DURATION_SECS,
        )
    }

    async fn get_max_duration_secs(&self) -> Result<i64, Box<dyn Error>> {
        self.get_parsed_or_default(
            config_keys::MAX_DURATION_SECS,
            engine_config::DEFAULT_MAX_DURATION_SECS,
        )
    }
}
