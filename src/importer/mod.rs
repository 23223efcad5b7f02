// ==========================================
// UPH 引擎 - 导入层
// ==========================================
// 职责: 外部工时数据导入，生成 work_cycle 记录
// 支持: CSV / Excel 文件，ERP 已取回的行
// ==========================================

pub mod conflict_handler;
pub mod data_cleaner;
pub mod dq_validator;
pub mod error;
pub mod field_mapper;
pub mod file_parser;
pub mod work_cycle_importer_impl;
pub mod work_cycle_importer_trait;

// 重导出核心类型
pub use conflict_handler::ConflictHandler as ConflictHandlerImpl;
pub use data_cleaner::DataCleaner as DataCleanerImpl;
pub use dq_validator::DqValidator as DqValidatorImpl;
pub use error::{ImportError, ImportResult};
pub use field_mapper::FieldMapper as FieldMapperImpl;
pub use file_parser::{CsvParser, ExcelParser, UniversalFileParser};
pub use work_cycle_importer_impl::WorkCycleImporterImpl;

// 重导出 Trait 接口
pub use work_cycle_importer_trait::{
    ConflictHandler, DataCleaner, DqValidator, FieldMapper, FileParser, WorkCycleImporter,
};
