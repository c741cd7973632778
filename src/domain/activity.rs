// ==========================================
// 工程材料检测数据系统 - 活动记录实体
// ==========================================
// 职责: 每日现场报告 / 专项检查的叙述性记录
// 说明: 附件仅跟踪数量, 附件内容由外部附件存储负责
// ==========================================

use crate::domain::types::{ActivityKind, ReviewStatus};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 活动记录 (DFR / 专项检查)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub activity_id: String,
    pub project_id: String,
    pub kind: ActivityKind,
    pub activity_date: NaiveDate,
    pub inspector: String,
    pub narrative: String,
    /// 附件数量 (不存储附件字节)
    pub attachment_count: i32,
    pub review_status: ReviewStatus,
    pub record_rev: i32,
    pub created_at: String,
}

impl ActivityRecord {
    pub fn new(
        project_id: String,
        kind: ActivityKind,
        activity_date: NaiveDate,
        inspector: String,
        narrative: String,
    ) -> Self {
        Self {
            activity_id: Uuid::new_v4().to_string(),
            project_id,
            kind,
            activity_date,
            inspector,
            narrative,
            attachment_count: 0,
            review_status: ReviewStatus::Pending,
            record_rev: 1,
            created_at: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}
