// ==========================================
// UPH 引擎 - 工时导入 API
// ==========================================
// 职责: 封装文件 / ERP 行导入，导入批次查询
// 说明: 导入只写 work_cycle，不触发重算；是否重算由调用方决定
// ==========================================

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tracing::info;

use crate::api::error::{ApiError, ApiResult};
use crate::config::ConfigManager;
use crate::domain::types::{DataSource, ImportMode};
use crate::domain::work_cycle::{ImportBatch, ImportReport, RawWorkCycleRecord};
use crate::importer::{ImportError, WorkCycleImporter, WorkCycleImporterImpl};
use crate::repository::{WorkCycleImportRepository, WorkCycleImportRepositoryImpl};

type DefaultImporter = WorkCycleImporterImpl<WorkCycleImportRepositoryImpl, Arc<ConfigManager>>;

fn import_failure(err: Box<dyn std::error::Error>) -> ApiError {
    ApiError::from(ImportError::from(err))
}

/// 导入 API
pub struct ImportApi {
    importer: DefaultImporter,
    batch_repo: WorkCycleImportRepositoryImpl,
}

impl ImportApi {
    pub fn new(conn: Arc<Mutex<Connection>>, config_manager: Arc<ConfigManager>) -> Self {
        Self {
            importer: WorkCycleImporterImpl::with_defaults(
                WorkCycleImportRepositoryImpl::from_connection(conn.clone()),
                config_manager,
            ),
            batch_repo: WorkCycleImportRepositoryImpl::from_connection(conn),
        }
    }

    /// 导入单个文件（.csv / .xlsx / .xls）
    pub async fn import_file(&self, file_path: &str, mode: ImportMode) -> ApiResult<ImportReport> {
        if file_path.trim().is_empty() {
            return Err(ApiError::InvalidInput("文件路径不能为空".to_string()));
        }
        let report = self
            .importer
            .import_from_file(Path::new(file_path), mode)
            .await
            .map_err(import_failure)?;
        info!(
            batch_id = %report.batch.batch_id,
            inserted = report.summary.inserted,
            skipped = report.summary.skipped(),
            "文件导入完成"
        );
        Ok(report)
    }

    /// 并发导入多个文件；单个文件失败不影响其他文件
    pub async fn import_files(
        &self,
        file_paths: Vec<String>,
        mode: ImportMode,
    ) -> ApiResult<Vec<Result<ImportReport, String>>> {
        if file_paths.is_empty() {
            return Err(ApiError::InvalidInput("文件列表不能为空".to_string()));
        }
        self.importer
            .batch_import(file_paths, mode)
            .await
            .map_err(import_failure)
    }

    /// 导入 ERP 已取回的行
    pub async fn import_rows(
        &self,
        rows: Vec<RawWorkCycleRecord>,
        source: DataSource,
        mode: ImportMode,
    ) -> ApiResult<ImportReport> {
        self.importer
            .import_rows(rows, source, mode)
            .await
            .map_err(import_failure)
    }

    /// 最近的导入批次
    pub async fn recent_batches(&self, limit: usize) -> ApiResult<Vec<ImportBatch>> {
        self.batch_repo
            .get_recent_batches(limit)
            .await
            .map_err(|e| ApiError::DatabaseError(e.to_string()))
    }
}
