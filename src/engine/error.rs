// ==========================================
// UPH 引擎 - 引擎层错误类型
// ==========================================
// 工具: thiserror 派生宏
// 说明: 关键字段缺失在导入 DQ 报告中计数（DqKind::MissingKeyField），
//       无法确定产量与已损坏工时在 RunSummary 中计数；
//       仅持久化失败、配置读取失败或全量输入失败会中止重算
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 引擎层错误类型
#[derive(Error, Debug)]
pub enum EngineError {
    // ===== 行级错误（跳过并计数）=====
    #[error("时长非法 (raw={raw:?}): {reason}")]
    InvalidDuration { raw: String, reason: String },

    // ===== 运行级错误（中止重算）=====
    #[error("重算进行中，请稍后重试")]
    ConcurrentRecalculation,

    #[error("持久化失败: {0}")]
    PersistenceFailure(String),

    #[error("无有效输入: {0}")]
    NoValidInput(String),

    #[error("重算已取消")]
    Cancelled,

    #[error("配置读取失败: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<RepositoryError> for EngineError {
    fn from(err: RepositoryError) -> Self {
        EngineError::PersistenceFailure(err.to_string())
    }
}

/// Result 类型别名
pub type EngineResult<T> = Result<T, EngineError>;
