// ==========================================
// 工程材料检测数据系统 - 审核 API
// ==========================================
// 依据: QA_Review_Workflow.md - 审核状态机
// 职责: 审核裁定 / 解锁 / 批量导出的业务入口
// 红线: 裁定必须过权限与状态机双重校验, 且全部留痕
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::api::export::{ExportArtifact, ExportRenderer, ExportRequest};
use crate::domain::action_log::ActionLog;
use crate::domain::field_test::FieldTestResult;
use crate::domain::types::{Actor, ExportFormat, ReviewStatus};
use crate::engine::review_workflow::{ReviewSelection, ReviewWorkflow};
use crate::repository::{
    ActionLogRepository, ActivityRepository, FieldTestRepository, SampleRepository,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

/// 审核对象类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewTarget {
    FieldTest,
    Sample,
    Activity,
}

pub struct ReviewApi {
    field_test_repo: Arc<FieldTestRepository>,
    sample_repo: Arc<SampleRepository>,
    activity_repo: Arc<ActivityRepository>,
    action_log_repo: Arc<ActionLogRepository>,
    renderer: Arc<dyn ExportRenderer>,
}

impl ReviewApi {
    pub fn new(
        field_test_repo: Arc<FieldTestRepository>,
        sample_repo: Arc<SampleRepository>,
        activity_repo: Arc<ActivityRepository>,
        action_log_repo: Arc<ActionLogRepository>,
        renderer: Arc<dyn ExportRenderer>,
    ) -> Self {
        Self {
            field_test_repo,
            sample_repo,
            activity_repo,
            action_log_repo,
            renderer,
        }
    }

    fn current_status(&self, target: ReviewTarget, record_id: &str) -> ApiResult<(ReviewStatus, i32)> {
        match target {
            ReviewTarget::FieldTest => {
                let t = self
                    .field_test_repo
                    .find_by_id(record_id)?
                    .ok_or_else(|| ApiError::NotFound(format!("检测记录不存在: {}", record_id)))?;
                Ok((t.review_status, t.record_rev))
            }
            ReviewTarget::Sample => {
                let s = self
                    .sample_repo
                    .find_by_id(record_id)?
                    .ok_or_else(|| ApiError::NotFound(format!("试样不存在: {}", record_id)))?;
                Ok((s.review_status, s.record_rev))
            }
            ReviewTarget::Activity => {
                let a = self
                    .activity_repo
                    .find_by_id(record_id)?
                    .ok_or_else(|| ApiError::NotFound(format!("活动记录不存在: {}", record_id)))?;
                Ok((a.review_status, a.record_rev))
            }
        }
    }

    /// 审核裁定 / 解锁
    ///
    /// 校验顺序: 权限 -> 状态机 -> 乐观锁写入。
    pub fn set_status(
        &self,
        target: ReviewTarget,
        record_id: &str,
        to: ReviewStatus,
        expected_rev: i32,
        actor: &Actor,
    ) -> ApiResult<()> {
        ReviewWorkflow::authorize(actor)?;

        let (from, _) = self.current_status(target, record_id)?;
        ReviewWorkflow::validate_transition(from, to)?;

        match target {
            ReviewTarget::FieldTest => {
                self.field_test_repo
                    .set_review_status(record_id, to, expected_rev)?
            }
            ReviewTarget::Sample => self
                .sample_repo
                .set_review_status(record_id, to, expected_rev)?,
            ReviewTarget::Activity => self
                .activity_repo
                .set_review_status(record_id, to, expected_rev)?,
        }

        info!(
            target = ?target,
            record_id = %record_id,
            from = %from,
            to = %to,
            actor = %actor.actor_id,
            "审核状态已流转"
        );

        let log = ActionLog::new("SET_REVIEW_STATUS", &actor.actor_id)
            .with_record(record_id)
            .with_payload(json!({
                "target": target,
                "from": from,
                "to": to,
            }));
        if let Err(e) = self.action_log_repo.insert(&log) {
            warn!(error = %e, "操作日志写入失败");
        }

        Ok(())
    }

    /// 待审核的检测记录队列
    pub fn pending_tests(&self) -> ApiResult<Vec<FieldTestResult>> {
        Ok(self
            .field_test_repo
            .list_by_review_status(ReviewStatus::Pending)?)
    }

    /// 导出选中的检测记录
    ///
    /// 空选择集直接拒绝; 渲染方失败映射为 ExportFailed。
    pub async fn export(
        &self,
        selection: &ReviewSelection,
        format: ExportFormat,
        actor: &Actor,
    ) -> ApiResult<ExportArtifact> {
        let ids = selection.export_eligible()?;

        let mut records = Vec::with_capacity(ids.len());
        for id in &ids {
            let test = self
                .field_test_repo
                .find_by_id(id)?
                .ok_or_else(|| ApiError::NotFound(format!("检测记录不存在: {}", id)))?;
            records.push(test);
        }

        let request = ExportRequest {
            format,
            records,
            requested_by: actor.actor_id.clone(),
        };
        let artifact = self
            .renderer
            .render(&request)
            .await
            .map_err(|e| ApiError::ExportFailed(e.to_string()))?;

        info!(
            file_name = %artifact.file_name,
            record_count = artifact.record_count,
            "导出完成"
        );

        let log = ActionLog::new("EXPORT", &actor.actor_id).with_payload(json!({
            "format": format,
            "record_count": artifact.record_count,
            "file_name": artifact.file_name,
        }));
        if let Err(e) = self.action_log_repo.insert(&log) {
            warn!(error = %e, "操作日志写入失败");
        }

        Ok(artifact)
    }
}
