// ==========================================
// UPH 引擎 - 绩效 API
// ==========================================
// 职责: 重算触发 + 绩效查询 + 损坏标记维护
// 说明:
// - get_performance 无直接观测时按优先级估算，估算值不落库
// - list_performance_trimmed 为只读视图，不修改已持久化的绩效
// ==========================================

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::api::error::{ApiError, ApiResult};
use crate::config::ConfigManager;
use crate::domain::performance::{
    OperatorPerformanceRecord, Page, PerformanceFilter, PerformanceKey, PerformanceLookup,
};
use crate::domain::run::{RecalcRun, RunResult};
use crate::domain::types::{RunStatus, WorkCenter};
use crate::engine::error::EngineError;
use crate::engine::estimation::EstimationFallback;
use crate::engine::outlier::{OutlierFilter, TrimmedView};
use crate::engine::recalc::RecalcEngine;
use crate::repository::{
    CorruptionSummary, OperatorPerformanceRepository, RecalcRunRepository, WorkCycleRepository,
};

/// 分页查询结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformancePage {
    pub records: Vec<OperatorPerformanceRecord>,
    pub total: i64,
    pub offset: usize,
    pub limit: usize,
}

// ==========================================
// PerformanceApi
// ==========================================
pub struct PerformanceApi {
    recalc_engine: Arc<RecalcEngine>,
    performance_repo: Arc<OperatorPerformanceRepository>,
    cycle_repo: Arc<WorkCycleRepository>,
    run_repo: Arc<RecalcRunRepository>,
    config_manager: Arc<ConfigManager>,
    estimation: EstimationFallback,
}

impl PerformanceApi {
    pub fn new(
        recalc_engine: Arc<RecalcEngine>,
        performance_repo: Arc<OperatorPerformanceRepository>,
        cycle_repo: Arc<WorkCycleRepository>,
        run_repo: Arc<RecalcRunRepository>,
        config_manager: Arc<ConfigManager>,
    ) -> Self {
        Self {
            recalc_engine,
            performance_repo,
            cycle_repo,
            run_repo,
            config_manager,
            estimation: EstimationFallback::new(),
        }
    }

    // ==========================================
    // 重算
    // ==========================================

    /// 触发全量重算
    ///
    /// # 返回
    /// - Ok(RunResult): 成功或失败都以 RunResult 返回，失败时旧快照保留
    /// - Err(ApiError::RetryLater): 已有重算在运行
    pub fn recalculate(&self) -> ApiResult<RunResult> {
        let result = self.recalc_engine.recalculate()?;
        info!(
            run_id = %result.run_id,
            succeeded = result.succeeded,
            records = result.record_count,
            "重算请求完成"
        );
        Ok(result)
    }

    /// 当前重算状态
    pub fn recalc_status(&self) -> RunStatus {
        self.recalc_engine.status()
    }

    /// 请求取消正在进行的重算
    pub fn cancel_recalculation(&self) {
        self.recalc_engine.cancel();
    }

    pub fn latest_run(&self) -> ApiResult<Option<RecalcRun>> {
        Ok(self.recalc_engine.latest_run()?)
    }

    pub fn list_runs(&self, limit: usize) -> ApiResult<Vec<RecalcRun>> {
        Ok(self.run_repo.list_recent(limit)?)
    }

    // ==========================================
    // 查询
    // ==========================================

    /// 单条绩效查询（含估算回退）
    pub fn get_performance(
        &self,
        operator_name: &str,
        work_center: WorkCenter,
        routing_name: &str,
    ) -> ApiResult<PerformanceLookup> {
        if operator_name.trim().is_empty() {
            return Err(ApiError::InvalidInput("操作员不能为空".to_string()));
        }
        if routing_name.trim().is_empty() {
            return Err(ApiError::InvalidInput("工艺路线不能为空".to_string()));
        }

        let key = PerformanceKey::new(operator_name, work_center, routing_name);
        if let Some(record) = self.performance_repo.find(&key)? {
            if record.observation_count > 0 {
                return Ok(PerformanceLookup::Observed(record));
            }
        }

        let all = self.performance_repo.list_all()?;
        let lookup = self.estimation.resolve(&key, &all);
        debug!(
            operator = %key.operator_name,
            work_center = %key.work_center,
            routing = %key.routing_name,
            estimated = lookup.is_estimated(),
            "绩效查询完成"
        );
        Ok(lookup)
    }

    /// 分页列表
    pub fn list_performance(
        &self,
        filter: &PerformanceFilter,
        page: Page,
    ) -> ApiResult<PerformancePage> {
        if page.limit == 0 {
            return Err(ApiError::InvalidInput("limit 必须大于 0".to_string()));
        }
        let records = self.performance_repo.list(filter, page)?;
        let total = self.performance_repo.count(filter)?;
        Ok(PerformancePage {
            records,
            total,
            offset: page.offset,
            limit: page.limit,
        })
    }

    /// 离群裁剪视图
    ///
    /// # 参数
    /// - trim_pct: 每侧裁剪比例，None 时使用配置值；合法区间 [0, 0.5)
    ///
    /// 裁剪在 (工作中心, 工艺路线) 上下文内进行，操作员过滤在裁剪之后应用
    pub fn list_performance_trimmed(
        &self,
        filter: &PerformanceFilter,
        trim_pct: Option<f64>,
    ) -> ApiResult<TrimmedView> {
        let config = self
            .config_manager
            .load_engine_config()
            .map_err(|e| EngineError::ConfigError(e.to_string()))?;
        let pct = trim_pct.unwrap_or(config.outlier_trim_pct);
        if !(0.0..0.5).contains(&pct) {
            return Err(ApiError::InvalidInput(format!(
                "裁剪比例须在 [0, 0.5) 之间: {}",
                pct
            )));
        }

        let context_filter = PerformanceFilter {
            operator_name: None,
            ..filter.clone()
        };
        let records = self
            .performance_repo
            .list(&context_filter, Page { offset: 0, limit: i64::MAX as usize })?;
        let observations = self.performance_repo.list_observations(&context_filter)?;

        let mut view = OutlierFilter::new(pct, config.outlier_min_group_size)
            .apply(&records, &observations);
        if let Some(operator) = &filter.operator_name {
            view.records.retain(|r| &r.operator_name == operator);
        }
        Ok(view)
    }

    // ==========================================
    // 损坏标记
    // ==========================================

    /// 外部纠正工具手工标记损坏
    pub fn flag_corrupted(&self, cycle_id: &str, reason: &str) -> ApiResult<bool> {
        if reason.trim().is_empty() {
            return Err(ApiError::InvalidInput("标记原因不能为空".to_string()));
        }
        let changed = self.cycle_repo.flag_corrupted(cycle_id, reason.trim())?;
        info!(cycle_id, changed, "手工标记损坏");
        Ok(changed)
    }

    pub fn is_corrupted(&self, cycle_id: &str) -> ApiResult<bool> {
        Ok(self.cycle_repo.is_corrupted(cycle_id)?)
    }

    /// 显式清除损坏标记
    pub fn clear_corruption(&self, cycle_id: &str) -> ApiResult<bool> {
        let cleared = self.cycle_repo.clear_corruption(cycle_id)?;
        info!(cycle_id, cleared, "清除损坏标记");
        Ok(cleared)
    }

    pub fn corruption_summary(&self) -> ApiResult<CorruptionSummary> {
        Ok(self.cycle_repo.corruption_summary()?)
    }
}
