// ==========================================
// UPH 引擎 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入模块所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use async_trait::async_trait;
use std::error::Error;

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 用途: 导入模块所需的配置读取接口
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait ImportConfigReader: Send + Sync {
    /// 获取导入分块大小（每个事务写入的行数）
    ///
    /// # 默认值
    /// - 2000
    async fn get_import_chunk_size(&self) -> Result<usize, Box<dyn Error>>;

    /// 获取单条时长下限（秒）
    ///
    /// # 默认值
    /// - 1
    async fn get_min_duration_secs(&self) -> Result<i64, Box<dyn Error>>;

    /// 获取单条时长上限（秒）
    ///
    /// # 默认值
    /// - 86400（24 小时）
    ///
    /// # 用途
    /// - 超过上限视为导出伪影，整行丢弃（不截断）
    async fn get_max_duration_secs(&self) -> Result<i64, Box<dyn Error>>;
}

// 共享实例（AppState 中以 Arc 持有 ConfigManager）
#[async_trait]
impl<T: ImportConfigReader + ?Sized> ImportConfigReader for std::sync::Arc<T> {
    async fn get_import_chunk_size(&self) -> Result<usize, Box<dyn Error>> {
        (**self).get_import_chunk_size().await
    }

    async fn get_min_duration_secs(&self) -> Result<i64, Box<dyn Error>> {
        (**self).get_min_duration_secs().await
    }

    async fn get_max_duration_secs(&self) -> Result<i64, Box<dyn Error>> {
        (**self).get_max_duration_secs().await
    }
}
