// ==========================================
// UPH 引擎 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 说明: 行级问题进入 DQ 报告，不走这里；此处只描述中止整个文件导入的错误
// ==========================================

use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件格式不支持: {0}（仅支持 .xlsx/.xls/.csv）")]
    UnsupportedFormat(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("Excel 解析失败: {0}")]
    ExcelParseError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    // ===== 数据映射错误 =====
    #[error("字段映射失败 (行 {row}): {message}")]
    FieldMappingError { row: usize, message: String },

    // ===== 数据库错误 =====
    #[error("数据库查询失败: {0}")]
    DatabaseQueryError(String),

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

impl From<rusqlite::Error> for ImportError {
    fn from(err: rusqlite::Error) -> Self {
        ImportError::DatabaseQueryError(err.to_string())
    }
}

impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        ImportError::ExcelParseError(err.to_string())
    }
}

impl From<Box<dyn std::error::Error>> for ImportError {
    fn from(err: Box<dyn std::error::Error>) -> Self {
        // 已经是 ImportError 的保持原样
        match err.downcast::<ImportError>() {
            Ok(inner) => *inner,
            Err(other) => ImportError::InternalError(other.to_string()),
        }
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boxed_import_error_is_preserved() {
        let boxed: Box<dyn std::error::Error> =
            Box::new(ImportError::FileNotFound("a.csv".to_string()));
        assert!(matches!(
            ImportError::from(boxed),
            ImportError::FileNotFound(path) if path == "a.csv"
        ));

        let boxed: Box<dyn std::error::Error> = "boom".into();
        assert!(matches!(ImportError::from(boxed), ImportError::InternalError(_)));
    }
}
