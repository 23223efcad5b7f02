// ==========================================
// UPH 引擎 - 工时导入器实现
// ==========================================
// 职责: 整合导入流程，从文件 / ERP 行到 work_cycle 表
// 流程: 解析 → 映射 → 清洗 → DQ 校验(时长归一化) → 工作中心分类
//       → 重复检测 → 分块写入 → 批次日志
// 红线:
// - 行级问题只计数并写入 DQ 报告，不中止导入
// - 每个分块独立事务，失败分块不回滚已提交分块
// ==========================================

use crate::config::engine_config::DEFAULT_IMPORT_CHUNK_SIZE;
use crate::config::ImportConfigReader;
use crate::domain::types::{DataSource, ImportMode};
use crate::domain::work_cycle::{
    CorruptionFlag, DqKind, DqLevel, DqSummary, DqViolation, ImportBatch, ImportReport,
    RawWorkCycleRecord, WorkCycleRecord,
};
use crate::engine::work_center::WorkCenterClassifier;
use crate::importer::conflict_handler::ConflictHandler as ConflictHandlerImpl;
use crate::importer::data_cleaner::DataCleaner as DataCleanerImpl;
use crate::importer::dq_validator::DqValidator as DqValidatorImpl;
use crate::importer::field_mapper::FieldMapper as FieldMapperImpl;
use crate::importer::file_parser::UniversalFileParser;
use crate::importer::work_cycle_importer_trait::{
    ConflictHandler, DataCleaner, DqValidator, FieldMapper, FileParser, WorkCycleImporter,
};
use crate::perf::PerfGuard;
use crate::repository::{UpsertCounts, WorkCycleImportRepository};
use chrono::Utc;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// 派生 cycle_id 的命名空间
const CYCLE_ID_NAMESPACE: Uuid = Uuid::NAMESPACE_OID;

// ==========================================
// WorkCycleImporterImpl - 工时导入器
// ==========================================
pub struct WorkCycleImporterImpl<R, C>
where
    R: WorkCycleImportRepository,
    C: ImportConfigReader,
{
    // 数据访问层
    import_repo: R,

    // 配置读取器
    config: C,

    // 导入组件
    file_parser: Box<dyn FileParser>,
    field_mapper: Box<dyn FieldMapper>,
    data_cleaner: Box<dyn DataCleaner>,
    conflict_handler: Box<dyn ConflictHandler>,
    classifier: WorkCenterClassifier,
}

/// 单次导入的来源描述
struct ImportSource {
    file_name: Option<String>,
    data_source: DataSource,
}

impl<R, C> WorkCycleImporterImpl<R, C>
where
    R: WorkCycleImportRepository,
    C: ImportConfigReader,
{
    /// 创建导入器
    ///
    /// DQ 校验器不在此注入：其时长区间在每次导入时从配置读取
    pub fn new(
        import_repo: R,
        config: C,
        file_parser: Box<dyn FileParser>,
        field_mapper: Box<dyn FieldMapper>,
        data_cleaner: Box<dyn DataCleaner>,
        conflict_handler: Box<dyn ConflictHandler>,
        classifier: WorkCenterClassifier,
    ) -> Self {
        Self {
            import_repo,
            config,
            file_parser,
            field_mapper,
            data_cleaner,
            conflict_handler,
            classifier,
        }
    }

    /// 使用默认组件装配
    pub fn with_defaults(import_repo: R, config: C) -> Self {
        Self::new(
            import_repo,
            config,
            Box::new(UniversalFileParser),
            Box::new(FieldMapperImpl),
            Box::new(DataCleanerImpl),
            Box::new(ConflictHandlerImpl),
            WorkCenterClassifier::new(),
        )
    }
}

#[async_trait::async_trait]
impl<R, C> WorkCycleImporter for WorkCycleImporterImpl<R, C>
where
    R: WorkCycleImportRepository + Send + Sync,
    C: ImportConfigReader + Send + Sync,
{
    #[instrument(skip(self, file_path), fields(mode = %mode, batch_id = tracing::field::Empty))]
    async fn import_from_file<P: AsRef<Path> + Send>(
        &self,
        file_path: P,
        mode: ImportMode,
    ) -> Result<ImportReport, Box<dyn Error>> {
        let path = file_path.as_ref();
        let file_path_str = path.to_str().unwrap_or("unknown").to_string();
        info!(file_path = %file_path_str, "开始导入工时文件");

        // === 步骤 1: 解析文件 ===
        debug!("步骤 1: 解析文件");
        let raw_rows = self.file_parser.parse_to_raw_records(path).map_err(|e| {
            error!(error = %e, "文件解析失败");
            e
        })?;
        info!(total_rows = raw_rows.len(), "文件解析完成");

        // === 步骤 2: 字段映射 ===
        debug!("步骤 2: 字段映射");
        let total_rows = raw_rows.len();
        let mut records = Vec::with_capacity(total_rows);
        let mut mapping_violations = Vec::new();
        for (idx, row) in raw_rows.into_iter().enumerate() {
            match self.field_mapper.map_to_raw_cycle(row, idx + 1) {
                Ok(record) => records.push(record),
                Err(e) => mapping_violations.push(DqViolation {
                    row_number: idx + 1,
                    cycle_id: None,
                    level: DqLevel::Error,
                    kind: DqKind::InvalidNumber,
                    field: "quantity".to_string(),
                    message: e.to_string(),
                }),
            }
        }
        if !mapping_violations.is_empty() {
            warn!(count = mapping_violations.len(), "字段映射失败的行已跳过");
        }

        let is_csv = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);
        let source = ImportSource {
            file_name: path
                .file_name()
                .and_then(|n| n.to_str())
                .map(str::to_string),
            data_source: if is_csv {
                DataSource::CsvImport
            } else {
                DataSource::ExcelImport
            },
        };

        self.process_records(source, records, total_rows, mapping_violations, mode)
            .await
    }

    #[instrument(
        skip(self, rows),
        fields(rows = rows.len(), source = %source, mode = %mode, batch_id = tracing::field::Empty)
    )]
    async fn import_rows(
        &self,
        mut rows: Vec<RawWorkCycleRecord>,
        source: DataSource,
        mode: ImportMode,
    ) -> Result<ImportReport, Box<dyn Error>> {
        info!("开始导入已取回的工时行");
        let total_rows = rows.len();
        // 接口行没有文件行号，按到达顺序编号
        for (idx, row) in rows.iter_mut().enumerate() {
            row.row_number = idx + 1;
        }
        let source = ImportSource {
            file_name: None,
            data_source: source,
        };
        self.process_records(source, rows, total_rows, Vec::new(), mode)
            .await
    }

    async fn batch_import<P: AsRef<Path> + Send + Sync>(
        &self,
        file_paths: Vec<P>,
        mode: ImportMode,
    ) -> Result<Vec<Result<ImportReport, String>>, Box<dyn Error>> {
        use futures::future::join_all;

        info!(count = file_paths.len(), "开始批量导入文件");

        let import_tasks = file_paths.into_iter().map(|path| {
            let path_str = path.as_ref().to_str().unwrap_or("unknown").to_string();
            async move {
                match self.import_from_file(path, mode).await {
                    Ok(report) => {
                        info!(
                            file = %path_str,
                            inserted = report.summary.inserted,
                            "文件导入成功"
                        );
                        Ok(report)
                    }
                    Err(e) => {
                        error!(file = %path_str, error = %e, "文件导入失败");
                        Err(format!("文件 {} 导入失败: {}", path_str, e))
                    }
                }
            }
        });

        let results = join_all(import_tasks).await;

        info!(
            total = results.len(),
            success = results.iter().filter(|r| r.is_ok()).count(),
            failed = results.iter().filter(|r| r.is_err()).count(),
            "批量导入完成"
        );

        Ok(results)
    }
}

// 辅助方法
impl<R, C> WorkCycleImporterImpl<R, C>
where
    R: WorkCycleImportRepository + Send + Sync,
    C: ImportConfigReader + Send + Sync,
{
    /// 映射之后的公共阶段
    async fn process_records(
        &self,
        source: ImportSource,
        mut records: Vec<RawWorkCycleRecord>,
        total_rows: usize,
        mut violations: Vec<DqViolation>,
        mode: ImportMode,
    ) -> Result<ImportReport, Box<dyn Error>> {
        let start_time = Instant::now();
        let mut perf = PerfGuard::new("import");
        let batch_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("batch_id", batch_id.as_str());

        let mut summary = DqSummary {
            total_rows,
            invalid_number: violations.len(),
            ..Default::default()
        };

        // 区间阈值读取失败时回退默认值
        let min_secs = self.config.get_min_duration_secs().await.ok();
        let max_secs = self.config.get_max_duration_secs().await.ok();
        let validator = match (min_secs, max_secs) {
            (Some(min), Some(max)) => DqValidatorImpl::new(min, max),
            _ => {
                warn!("时长区间配置读取失败，使用默认值");
                DqValidatorImpl::default()
            }
        };
        let chunk_size = self
            .config
            .get_import_chunk_size()
            .await
            .unwrap_or(DEFAULT_IMPORT_CHUNK_SIZE)
            .max(1);

        // === 步骤 3: 清洗 ===
        debug!("步骤 3: 数据清洗");
        for record in records.iter_mut() {
            self.data_cleaner.clean_record(record);
        }

        // === 步骤 4: DQ 校验 + 分类 + 转换 ===
        debug!("步骤 4: DQ 校验与工作中心分类");
        let mut cycles = Vec::with_capacity(records.len());
        let mut occurrences: HashMap<String, usize> = HashMap::new();
        let mut unclassified = 0usize;
        for record in records {
            let key_violations = validator.validate_key_fields(&record);
            if !key_violations.is_empty() {
                summary.missing_key_field += 1;
                violations.extend(key_violations);
                continue;
            }

            let duration_secs = match validator.validate_duration(&record) {
                Ok(secs) => secs,
                Err(violation) => {
                    summary.invalid_duration += 1;
                    violations.push(violation);
                    continue;
                }
            };
            if let Some(violation) = validator.check_work_order(&record) {
                summary.missing_work_order += 1;
                violations.push(violation);
            }
            if duration_secs == 0 {
                violations.push(DqViolation {
                    row_number: record.row_number,
                    cycle_id: record.cycle_id.clone(),
                    level: DqLevel::Info,
                    kind: DqKind::ZeroDurationFragment,
                    field: "duration_raw".to_string(),
                    message: "0 秒拆分碎片，保留待合并".to_string(),
                });
            }

            match self.to_cycle(record, duration_secs, &source, &batch_id, &mut occurrences) {
                Some((cycle, classified)) => {
                    if !classified {
                        unclassified += 1;
                    }
                    cycles.push(cycle);
                }
                None => summary.missing_key_field += 1,
            }
        }
        info!(
            valid = cycles.len(),
            invalid_duration = summary.invalid_duration,
            missing_key_field = summary.missing_key_field,
            missing_work_order = summary.missing_work_order,
            unclassified,
            "DQ 校验完成"
        );

        // === 步骤 5: 同批次重复检测 ===
        debug!("步骤 5: 重复检测");
        let id_rows: Vec<(usize, String)> = cycles
            .iter()
            .map(|(row, c)| (*row, c.cycle_id.clone()))
            .collect();
        let duplicates = self.conflict_handler.detect_duplicates(&id_rows);
        summary.duplicate_in_batch = duplicates.len();
        let duplicate_rows: HashSet<usize> = duplicates.iter().map(|(row, _)| *row).collect();
        violations.extend(duplicates.into_iter().map(|(row_number, cycle_id)| DqViolation {
            row_number,
            cycle_id: Some(cycle_id.clone()),
            level: DqLevel::Duplicate,
            kind: DqKind::DuplicateCycle,
            field: "cycle_id".to_string(),
            message: format!("同批次内重复工时 ID: {}", cycle_id),
        }));
        let unique: Vec<(usize, WorkCycleRecord)> = cycles
            .into_iter()
            .filter(|(row, _)| !duplicate_rows.contains(row))
            .collect();

        // === 步骤 6: 分块写入 ===
        debug!(chunk_size, "步骤 6: 分块写入");
        let mut counts = UpsertCounts::default();
        for (chunk_idx, chunk) in unique.chunks(chunk_size).enumerate() {
            let chunk_ids: Vec<(usize, String)> = chunk
                .iter()
                .map(|(row, c)| (*row, c.cycle_id.clone()))
                .collect();
            let existing_ids = self
                .import_repo
                .batch_check_exists(chunk_ids.iter().map(|(_, id)| id.clone()).collect())
                .await?;
            let existing = self.conflict_handler.detect_existing(&chunk_ids, &existing_ids);
            violations.extend(existing.into_iter().map(|(row_number, cycle_id)| {
                let message = match mode {
                    ImportMode::Append => format!("工时 ID 已存在，追加模式下忽略: {}", cycle_id),
                    ImportMode::Corrective => format!("工时 ID 已存在，纠正性覆盖: {}", cycle_id),
                };
                DqViolation {
                    row_number,
                    cycle_id: Some(cycle_id),
                    level: DqLevel::Info,
                    kind: DqKind::DuplicateCycle,
                    field: "cycle_id".to_string(),
                    message,
                }
            }));

            let chunk_records: Vec<WorkCycleRecord> = chunk.iter().map(|(_, c)| c.clone()).collect();
            let chunk_counts = match self.import_repo.batch_upsert_cycles(chunk_records, mode).await {
                Ok(c) => c,
                Err(e) => {
                    error!(
                        chunk = chunk_idx,
                        committed_rows = counts.inserted + counts.replaced,
                        error = %e,
                        "分块写入失败，之前的分块已提交"
                    );
                    return Err(e);
                }
            };
            debug!(
                chunk = chunk_idx,
                inserted = chunk_counts.inserted,
                replaced = chunk_counts.replaced,
                ignored = chunk_counts.ignored,
                "分块已提交"
            );
            counts.merge(chunk_counts);
        }
        summary.inserted = counts.inserted;
        summary.replaced = counts.replaced;
        summary.ignored_existing = counts.ignored;

        // === 步骤 7: 记录批次信息 ===
        let elapsed_time = start_time.elapsed();
        let dq_report = json!({
            "mode": mode,
            "summary": &summary,
            "unclassified_work_centers": unclassified,
            "violations": &violations,
        });
        let batch = ImportBatch {
            batch_id: batch_id.clone(),
            file_name: source.file_name.clone(),
            data_source: source.data_source,
            total_rows: total_rows as i64,
            inserted_rows: summary.inserted as i64,
            replaced_rows: summary.replaced as i64,
            skipped_rows: summary.skipped() as i64,
            duplicate_rows: (summary.duplicate_in_batch + summary.ignored_existing) as i64,
            imported_at: Utc::now(),
            elapsed_ms: elapsed_time.as_millis() as i64,
            dq_report_json: Some(serde_json::to_string(&dq_report)?),
        };
        self.import_repo.insert_batch(batch.clone()).await?;

        perf.set_rows(total_rows);
        info!(
            batch_id = %batch_id,
            total = total_rows,
            inserted = summary.inserted,
            replaced = summary.replaced,
            ignored = summary.ignored_existing,
            skipped = summary.skipped(),
            duplicates = summary.duplicate_in_batch,
            elapsed_ms = elapsed_time.as_millis(),
            "工时导入完成"
        );

        Ok(ImportReport {
            batch,
            summary,
            violations,
        })
    }

    /// 已校验记录 → WorkCycleRecord（附原始行号）
    ///
    /// # 返回
    /// - Some((row, cycle), classified): classified 为 false 表示落入默认工作中心
    /// - None: 关键字段缺失（校验之后不应出现）
    fn to_cycle(
        &self,
        record: RawWorkCycleRecord,
        duration_secs: i64,
        source: &ImportSource,
        batch_id: &str,
        occurrences: &mut HashMap<String, usize>,
    ) -> Option<((usize, WorkCycleRecord), bool)> {
        let operator_name = record.operator_name.clone()?;
        let work_center_raw = record.work_center_name.clone()?;
        let routing_name = record.routing_name.clone()?;
        let mo_number = record.mo_number.clone()?;
        let operation_name = record.operation_name.clone().unwrap_or_default();

        let classification = self.classifier.classify(&work_center_raw, &operation_name);
        let cycle_id = match &record.cycle_id {
            Some(id) => id.clone(),
            None => derive_cycle_id(&record, occurrences),
        };

        let cycle = WorkCycleRecord {
            cycle_id,
            operator_name,
            work_center_raw,
            work_center: classification.work_center,
            operation_name,
            work_order_ref: record.work_order_ref,
            mo_id: record.mo_id.unwrap_or_else(|| mo_number.clone()),
            mo_number,
            routing_name,
            duration_raw: record.duration_raw.unwrap_or_default(),
            duration_secs,
            quantity_done: record.quantity_done,
            production_qty: record.production_qty,
            created_at: record.created_at,
            data_source: source.data_source,
            batch_id: Some(batch_id.to_string()),
            corruption: CorruptionFlag::clean(),
        };
        Some(((record.row_number, cycle), !classification.is_default()))
    }
}

/// 缺少 ID 列时的确定性 cycle_id
///
/// UUIDv5(自然键 + 同键出现序号)。自然键不含时长与数量：
/// 纠正性重导入修正这些值后仍得到相同 ID，从而覆盖旧行；
/// 同一文件中自然键相同的多行（拆分行）按出现顺序各自保留
fn derive_cycle_id(record: &RawWorkCycleRecord, occurrences: &mut HashMap<String, usize>) -> String {
    let fields = [
        record.operator_name.as_deref(),
        record.work_center_name.as_deref(),
        record.operation_name.as_deref(),
        record.work_order_ref.as_deref(),
        record.mo_number.as_deref(),
        record.mo_id.as_deref(),
        record.routing_name.as_deref(),
    ];
    let mut content = fields
        .iter()
        .map(|f| f.unwrap_or(""))
        .collect::<Vec<_>>()
        .join("\u{1f}");
    content.push('\u{1f}');
    if let Some(created_at) = record.created_at {
        content.push_str(&created_at.to_string());
    }

    let occurrence = occurrences.entry(content.clone()).or_insert(0);
    *occurrence += 1;
    content.push('\u{1e}');
    content.push_str(&occurrence.to_string());

    Uuid::new_v5(&CYCLE_ID_NAMESPACE, content.as_bytes()).to_string()
}
