// ==========================================
// 工程材料检测数据系统 - 现场检测 API
// ==========================================
// 职责: 检测记录录入 / 编辑 / 复测关联的业务入口
// 流程: 解析规格 -> 计算派生量 -> 合格判定 -> 落库 (PENDING)
// 红线: 保存后记录固定所引用的规格修订, 保证判定可复算
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::ConfigManager;
use crate::domain::action_log::ActionLog;
use crate::domain::field_test::{FieldTestResult, RawReadings};
use crate::domain::retest::RetestLink;
use crate::domain::types::{Actor, MaterialFamily};
use crate::engine::review_workflow::ReviewWorkflow;
use crate::engine::retest_linkage::RetestLinkage;
use crate::engine::spec_resolver::SpecResolver;
use crate::engine::unit_calculator::{Computation, Targets, UnitCalculator};
use crate::repository::{
    ActionLogRepository, FieldTestRepository, RetestRepository, SpecRepository,
};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

/// 新建检测记录请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewFieldTest {
    pub project_id: String,
    pub material_family: MaterialFamily,
    pub location: String,
    pub elevation: Option<String>,
    pub test_date: NaiveDate,
    pub inspector: String,
    pub gauge_number: Option<String>,
    pub raw: RawReadings,
}

/// 编辑检测记录请求 (乐观锁)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldTestEdit {
    pub test_id: String,
    pub expected_rev: i32,
    pub location: String,
    pub elevation: Option<String>,
    pub test_date: NaiveDate,
    pub inspector: String,
    pub gauge_number: Option<String>,
    pub raw: RawReadings,
}

pub struct FieldTestApi {
    field_test_repo: Arc<FieldTestRepository>,
    spec_repo: Arc<SpecRepository>,
    retest_repo: Arc<RetestRepository>,
    action_log_repo: Arc<ActionLogRepository>,
    config: Arc<ConfigManager>,
}

impl FieldTestApi {
    pub fn new(
        field_test_repo: Arc<FieldTestRepository>,
        spec_repo: Arc<SpecRepository>,
        retest_repo: Arc<RetestRepository>,
        action_log_repo: Arc<ActionLogRepository>,
        config: Arc<ConfigManager>,
    ) -> Self {
        Self {
            field_test_repo,
            spec_repo,
            retest_repo,
            action_log_repo,
            config,
        }
    }

    fn legacy_tolerance(&self) -> ApiResult<f64> {
        self.config
            .get_legacy_moisture_tolerance()
            .map_err(|e| ApiError::InternalError(e.to_string()))
    }

    /// 录入检测记录
    ///
    /// 判定失败不阻止保存: 不合格记录照常落库 (PENDING), 供复测链取代。
    pub fn record_test(&self, req: NewFieldTest, actor: &Actor) -> ApiResult<FieldTestResult> {
        if req.project_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("项目编号不能为空".to_string()));
        }
        if req.location.trim().is_empty() {
            return Err(ApiError::InvalidInput("检测部位不能为空".to_string()));
        }
        if req.inspector.trim().is_empty() {
            return Err(ApiError::InvalidInput("检测员不能为空".to_string()));
        }

        // 解析规格 (引擎精确匹配, active 修订中取修订号最大者)
        let candidates =
            self.spec_repo
                .list_revisions(&req.project_id, req.material_family, &req.location)?;
        let spec = SpecResolver::resolve(
            &candidates,
            &req.project_id,
            req.material_family,
            &req.location,
        )?
        .clone();

        // 计算派生量
        let targets = Targets::from(&spec);
        let derived = match UnitCalculator::compute(req.material_family, &req.raw, &targets) {
            Computation::Computed(d) => d,
            Computation::NotComputable { reason } => {
                return Err(ApiError::NotComputable(reason));
            }
        };

        // 合格判定
        let judgement = SpecResolver::judge(
            &spec,
            req.material_family,
            &req.raw,
            &derived,
            self.legacy_tolerance()?,
        )?;

        // 项目内流水编号, 如 24-001
        let seq = self.field_test_repo.count_by_project(&req.project_id)? + 1;
        let test_no = format!("{:02}-{:03}", req.test_date.year() % 100, seq);

        let mut test = FieldTestResult::new(
            test_no,
            req.project_id,
            req.material_family,
            req.location,
            req.test_date,
            req.inspector,
            spec.spec_id.clone(),
            spec.revision,
            req.raw,
            derived,
            judgement.verdict,
            actor.actor_id.clone(),
        );
        test.elevation = req.elevation;
        test.gauge_number = req.gauge_number;

        self.field_test_repo.insert(&test)?;

        info!(
            test_no = %test.test_no,
            verdict = %test.verdict,
            percent = test.derived.percent,
            "检测记录已保存"
        );

        // 操作日志失败不阻断主流程
        let log = ActionLog::new("RECORD_FIELD_TEST", &actor.actor_id)
            .with_record(&test.test_id)
            .with_payload(json!({
                "test_no": test.test_no,
                "verdict": test.verdict,
                "reasons": judgement.reasons,
            }));
        if let Err(e) = self.action_log_repo.insert(&log) {
            warn!(error = %e, "操作日志写入失败");
        }

        Ok(test)
    }

    /// 编辑检测记录并重新判定
    ///
    /// APPROVED 记录锁定拒绝编辑; record_rev 过期拒绝写入。
    /// 部位未变时沿用原规格修订; 部位改变则重新解析 active 规格。
    pub fn update_test(&self, edit: FieldTestEdit, actor: &Actor) -> ApiResult<FieldTestResult> {
        let existing = self
            .field_test_repo
            .find_by_id(&edit.test_id)?
            .ok_or_else(|| ApiError::NotFound(format!("检测记录不存在: {}", edit.test_id)))?;

        ReviewWorkflow::guard_editable(&existing.test_id, existing.review_status)?;

        let spec = if edit.location == existing.location {
            self.spec_repo
                .find_by_id(&existing.spec_id)?
                .ok_or_else(|| {
                    ApiError::InternalError(format!("记录引用的规格丢失: {}", existing.spec_id))
                })?
        } else {
            let candidates = self.spec_repo.list_revisions(
                &existing.project_id,
                existing.material_family,
                &edit.location,
            )?;
            SpecResolver::resolve(
                &candidates,
                &existing.project_id,
                existing.material_family,
                &edit.location,
            )?
            .clone()
        };

        let targets = Targets::from(&spec);
        let derived = match UnitCalculator::compute(existing.material_family, &edit.raw, &targets) {
            Computation::Computed(d) => d,
            Computation::NotComputable { reason } => {
                return Err(ApiError::NotComputable(reason));
            }
        };
        let judgement = SpecResolver::judge(
            &spec,
            existing.material_family,
            &edit.raw,
            &derived,
            self.legacy_tolerance()?,
        )?;

        let mut updated = existing.clone();
        updated.location = edit.location;
        updated.elevation = edit.elevation;
        updated.test_date = edit.test_date;
        updated.inspector = edit.inspector;
        updated.gauge_number = edit.gauge_number;
        updated.spec_id = spec.spec_id.clone();
        updated.spec_revision = spec.revision;
        updated.raw = edit.raw;
        updated.derived = derived;
        updated.verdict = judgement.verdict;
        updated.record_rev = edit.expected_rev;

        let saved = self.field_test_repo.update_guarded(&updated)?;

        let log = ActionLog::new("UPDATE_FIELD_TEST", &actor.actor_id)
            .with_record(&saved.test_id)
            .with_payload(json!({
                "verdict": saved.verdict,
                "record_rev": saved.record_rev,
            }));
        if let Err(e) = self.action_log_repo.insert(&log) {
            warn!(error = %e, "操作日志写入失败");
        }

        Ok(saved)
    }

    /// 建立复测链接 (failing -> retest)
    pub fn link_retest(
        &self,
        failing_test_id: &str,
        retest_test_id: &str,
        actor: &Actor,
    ) -> ApiResult<RetestLink> {
        let failing = self
            .field_test_repo
            .find_by_id(failing_test_id)?
            .ok_or_else(|| ApiError::NotFound(format!("检测记录不存在: {}", failing_test_id)))?;
        let retest = self
            .field_test_repo
            .find_by_id(retest_test_id)?
            .ok_or_else(|| ApiError::NotFound(format!("检测记录不存在: {}", retest_test_id)))?;

        let links = self.retest_repo.list_all()?;
        RetestLinkage::validate_link(&links, &failing, &retest)?;

        let link = RetestLink::new(
            failing.test_id.clone(),
            retest.test_id.clone(),
            actor.actor_id.clone(),
        );
        self.retest_repo.insert(&link)?;

        let log = ActionLog::new("LINK_RETEST", &actor.actor_id)
            .with_record(&failing.test_id)
            .with_payload(json!({
                "retest_test_id": retest.test_id,
            }));
        if let Err(e) = self.action_log_repo.insert(&log) {
            warn!(error = %e, "操作日志写入失败");
        }

        Ok(link)
    }

    /// 复测链 (链首为传入记录, 回溯到最初的不合格记录)
    pub fn retest_chain(&self, test_id: &str) -> ApiResult<Vec<FieldTestResult>> {
        if self.field_test_repo.find_by_id(test_id)?.is_none() {
            return Err(ApiError::NotFound(format!("检测记录不存在: {}", test_id)));
        }
        let links = self.retest_repo.list_all()?;
        let mut chain = Vec::new();
        for id in RetestLinkage::chain_of(&links, test_id) {
            if let Some(test) = self.field_test_repo.find_by_id(&id)? {
                chain.push(test);
            }
        }
        Ok(chain)
    }

    pub fn get(&self, test_id: &str) -> ApiResult<FieldTestResult> {
        self.field_test_repo
            .find_by_id(test_id)?
            .ok_or_else(|| ApiError::NotFound(format!("检测记录不存在: {}", test_id)))
    }

    pub fn list_by_project(&self, project_id: &str) -> ApiResult<Vec<FieldTestResult>> {
        Ok(self.field_test_repo.list_by_project(project_id)?)
    }
}
