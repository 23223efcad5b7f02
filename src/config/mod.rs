// ==========================================
// UPH 引擎 - 配置层
// ==========================================
// 职责: 阈值配置管理，支持 config_kv 覆写
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod engine_config;
pub mod import_config_trait;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager};
pub use engine_config::EngineConfig;
pub use import_config_trait::ImportConfigReader;
