use super::pipeline::run_pipeline;
use super::types::{CancellationFlag, PipelineOutput};
use super::RecalcEngine;
use crate::config::{ConfigManager, EngineConfig};
use crate::domain::run::{RecalcRun, RunResult};
use crate::domain::types::RunStatus;
use crate::engine::error::{EngineError, EngineResult};
use crate::perf::PerfGuard;
use crate::repository::{OperatorPerformanceRepository, RecalcRunRepository, WorkCycleRepository};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// 运行守卫：Drop 时释放运行权
struct RunGuard<'a> {
    running: &'a AtomicBool,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

impl RecalcEngine {
    pub fn new(
        cycle_repo: Arc<WorkCycleRepository>,
        performance_repo: Arc<OperatorPerformanceRepository>,
        run_repo: Arc<RecalcRunRepository>,
        config_manager: Arc<ConfigManager>,
    ) -> Self {
        Self {
            cycle_repo,
            performance_repo,
            run_repo,
            config_manager,
            running: AtomicBool::new(false),
            status: Mutex::new(RunStatus::Idle),
            cancel: CancellationFlag::new(),
        }
    }

    /// 当前状态（轮询）
    pub fn status(&self) -> RunStatus {
        self.status
            .lock()
            .map(|s| *s)
            .unwrap_or(RunStatus::Failed)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// 请求取消正在进行的重算（在下一个阶段边界生效）
    pub fn cancel(&self) {
        if self.is_running() {
            info!("收到重算取消请求");
            self.cancel.cancel();
        }
    }

    /// 取消标记句柄（可交给其他线程）
    pub fn cancellation_flag(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    /// 最近一次运行日志
    pub fn latest_run(&self) -> EngineResult<Option<RecalcRun>> {
        Ok(self.run_repo.latest()?)
    }

    fn set_status(&self, status: RunStatus) {
        if let Ok(mut guard) = self.status.lock() {
            *guard = status;
        }
    }

    fn try_acquire(&self) -> EngineResult<RunGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| EngineError::ConcurrentRecalculation)?;
        Ok(RunGuard {
            running: &self.running,
        })
    }

    /// 全量重算
    ///
    /// # 返回
    /// - Ok(RunResult { succeeded: true, .. }): 快照已原子替换
    /// - Ok(RunResult { succeeded: false, .. }): 持久化失败/无有效输入/取消，旧快照不变
    /// - Err(ConcurrentRecalculation): 已有重算在运行，请稍后重试
    #[instrument(skip(self))]
    pub fn recalculate(&self) -> EngineResult<RunResult> {
        let _guard = match self.try_acquire() {
            Ok(guard) => guard,
            Err(e) => {
                warn!("重算进行中，拒绝新的触发");
                return Err(e);
            }
        };
        let mut perf = PerfGuard::new("recalculate");
        let started = Instant::now();

        self.cancel.reset();
        self.set_status(RunStatus::Running);

        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        info!(run_id = %run_id, "开始重算");

        // 阈值决定永久性损坏标记，读取失败时不回落默认值
        let config = self
            .config_manager
            .load_engine_config()
            .map_err(|e| e.to_string());
        let snapshot = config
            .as_ref()
            .ok()
            .and_then(|c| serde_json::to_string(c).ok());

        if let Err(e) = self
            .run_repo
            .insert_running(&run_id, started_at, snapshot.as_deref())
        {
            error!(run_id = %run_id, error = %e, "运行日志写入失败");
            self.set_status(RunStatus::Failed);
            return Ok(failed_result(
                run_id,
                Default::default(),
                EngineError::from(e),
                started,
            ));
        }

        let outcome = match &config {
            Ok(config) => self.execute(config, &run_id),
            Err(msg) => Err((EngineError::ConfigError(msg.clone()), Default::default())),
        };

        let result = match outcome {
            Ok(output) => {
                let summary_json = serde_json::to_string(&output.summary).ok();
                let record_count = output.records.len();
                if let Err(e) = self.run_repo.finish(
                    &run_id,
                    RunStatus::Succeeded,
                    record_count as i64,
                    summary_json.as_deref(),
                    None,
                ) {
                    // 快照已提交，仅日志收尾失败
                    warn!(run_id = %run_id, error = %e, "运行日志收尾失败");
                }
                self.set_status(RunStatus::Succeeded);
                perf.set_rows(output.summary.cycles_loaded);
                info!(
                    run_id = %run_id,
                    records = record_count,
                    newly_flagged = output.summary.newly_flagged(),
                    "重算成功"
                );
                RunResult {
                    run_id,
                    status: RunStatus::Succeeded,
                    succeeded: true,
                    record_count,
                    errors: Vec::new(),
                    summary: output.summary,
                    elapsed_ms: started.elapsed().as_millis() as i64,
                }
            }
            Err((err, summary)) => {
                error!(run_id = %run_id, error = %err, "重算失败，保留旧快照");
                let summary_json = serde_json::to_string(&summary).ok();
                if let Err(e) = self.run_repo.finish(
                    &run_id,
                    RunStatus::Failed,
                    0,
                    summary_json.as_deref(),
                    Some(&err.to_string()),
                ) {
                    warn!(run_id = %run_id, error = %e, "运行日志收尾失败");
                }
                self.set_status(RunStatus::Failed);
                failed_result(run_id, summary, err, started)
            }
        };

        Ok(result)
    }

    /// 读取 → 流水线 → 回写标记 → 原子替换
    fn execute(
        &self,
        config: &EngineConfig,
        run_id: &str,
    ) -> Result<PipelineOutput, (EngineError, crate::domain::run::RunSummary)> {
        let cycles = self
            .cycle_repo
            .load_all()
            .map_err(|e| (EngineError::from(e), Default::default()))?;
        if cycles.is_empty() {
            return Err((
                EngineError::NoValidInput("work_cycle 表为空".to_string()),
                Default::default(),
            ));
        }
        info!(run_id, cycles = cycles.len(), "工时已载入");

        let output = run_pipeline(&cycles, config, Utc::now(), &self.cancel)
            .map_err(|e| (e, Default::default()))?;
        let summary = output.summary.clone();

        // 标记是一次性写入的持久属性，先于快照落库
        if !output.newly_flagged.is_empty() {
            let flagged = self
                .cycle_repo
                .flag_corrupted_batch(
                    output
                        .newly_flagged
                        .iter()
                        .map(|(id, reason)| (id.as_str(), reason.as_str())),
                )
                .map_err(|e| (EngineError::from(e), summary.clone()))?;
            info!(run_id, flagged, "损坏标记已回写");
        }

        if self.cancel.is_cancelled() {
            return Err((EngineError::Cancelled, summary));
        }

        // 全部工时被排除（已损坏/无产量/零时长）时不得用空表覆盖旧快照
        if summary.mo_aggregates == 0 {
            return Err((
                EngineError::NoValidInput(format!(
                    "{} 条工时中没有可聚合的有效工时",
                    summary.cycles_loaded
                )),
                summary,
            ));
        }

        self.performance_repo
            .replace_snapshot(&output.records, &output.observations)
            .map_err(|e| (EngineError::from(e), summary.clone()))?;

        Ok(output)
    }
}

fn failed_result(
    run_id: String,
    summary: crate::domain::run::RunSummary,
    err: EngineError,
    started: Instant,
) -> RunResult {
    RunResult {
        run_id,
        status: RunStatus::Failed,
        succeeded: false,
        record_count: 0,
        errors: vec![err.to_string()],
        summary,
        elapsed_ms: started.elapsed().as_millis() as i64,
    }
}
