// ==========================================
// 工程材料检测数据系统 - 活动记录 API
// ==========================================
// 职责: 每日现场报告 / 专项检查的录入与编辑
// 红线: APPROVED 记录锁定, 编辑走乐观锁
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::action_log::ActionLog;
use crate::domain::activity::ActivityRecord;
use crate::domain::types::{ActivityKind, Actor};
use crate::engine::review_workflow::ReviewWorkflow;
use crate::repository::{ActionLogRepository, ActivityRepository};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

/// 新建活动记录请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewActivity {
    pub project_id: String,
    pub kind: ActivityKind,
    pub activity_date: NaiveDate,
    pub inspector: String,
    pub narrative: String,
    pub attachment_count: i32,
}

/// 编辑活动记录请求 (乐观锁)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEdit {
    pub activity_id: String,
    pub expected_rev: i32,
    pub activity_date: NaiveDate,
    pub inspector: String,
    pub narrative: String,
    pub attachment_count: i32,
}

pub struct ActivityApi {
    activity_repo: Arc<ActivityRepository>,
    action_log_repo: Arc<ActionLogRepository>,
}

impl ActivityApi {
    pub fn new(
        activity_repo: Arc<ActivityRepository>,
        action_log_repo: Arc<ActionLogRepository>,
    ) -> Self {
        Self {
            activity_repo,
            action_log_repo,
        }
    }

    pub fn create_activity(&self, req: NewActivity, actor: &Actor) -> ApiResult<ActivityRecord> {
        if req.project_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("项目编号不能为空".to_string()));
        }
        if req.narrative.trim().is_empty() {
            return Err(ApiError::InvalidInput("活动叙述不能为空".to_string()));
        }
        if req.attachment_count < 0 {
            return Err(ApiError::InvalidInput("附件数量不能为负".to_string()));
        }

        let mut activity = ActivityRecord::new(
            req.project_id,
            req.kind,
            req.activity_date,
            req.inspector,
            req.narrative,
        );
        activity.attachment_count = req.attachment_count;

        self.activity_repo.insert(&activity)?;

        let log = ActionLog::new("CREATE_ACTIVITY", &actor.actor_id)
            .with_record(&activity.activity_id)
            .with_payload(json!({
                "kind": activity.kind,
                "activity_date": activity.activity_date,
            }));
        if let Err(e) = self.action_log_repo.insert(&log) {
            warn!(error = %e, "操作日志写入失败");
        }

        Ok(activity)
    }

    pub fn update_activity(&self, edit: ActivityEdit, actor: &Actor) -> ApiResult<ActivityRecord> {
        let existing = self
            .activity_repo
            .find_by_id(&edit.activity_id)?
            .ok_or_else(|| ApiError::NotFound(format!("活动记录不存在: {}", edit.activity_id)))?;

        ReviewWorkflow::guard_editable(&existing.activity_id, existing.review_status)?;

        if edit.narrative.trim().is_empty() {
            return Err(ApiError::InvalidInput("活动叙述不能为空".to_string()));
        }
        if edit.attachment_count < 0 {
            return Err(ApiError::InvalidInput("附件数量不能为负".to_string()));
        }

        let mut updated = existing.clone();
        updated.activity_date = edit.activity_date;
        updated.inspector = edit.inspector;
        updated.narrative = edit.narrative;
        updated.attachment_count = edit.attachment_count;
        updated.record_rev = edit.expected_rev;

        let saved = self.activity_repo.update_guarded(&updated)?;

        let log = ActionLog::new("UPDATE_ACTIVITY", &actor.actor_id)
            .with_record(&saved.activity_id)
            .with_payload(json!({ "record_rev": saved.record_rev }));
        if let Err(e) = self.action_log_repo.insert(&log) {
            warn!(error = %e, "操作日志写入失败");
        }

        Ok(saved)
    }

    pub fn get(&self, activity_id: &str) -> ApiResult<ActivityRecord> {
        self.activity_repo
            .find_by_id(activity_id)?
            .ok_or_else(|| ApiError::NotFound(format!("活动记录不存在: {}", activity_id)))
    }

    pub fn list_by_project(&self, project_id: &str) -> ApiResult<Vec<ActivityRecord>> {
        Ok(self.activity_repo.list_by_project(project_id)?)
    }
}
