// ==========================================
// 工程材料检测数据系统 - 操作日志领域模型
// ==========================================
// 依据: QA_Review_Workflow.md - 审计追踪
// 红线: 审核流转必须记录操作人, 保证可解释性
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ==========================================
// ActionLog - 操作日志
// ==========================================
// 用途: 审核流转 / 复测关联 / 破型录入 / 导出的审计追踪
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLog {
    pub action_id: String,        // 日志ID
    pub action_type: String,      // 操作类型 (SET_REVIEW_STATUS / LINK_RETEST / ...)
    pub action_ts: NaiveDateTime, // 操作时间戳
    pub actor: String,            // 操作人

    // ===== 关联对象 =====
    pub project_id: Option<String>, // 关联项目 (可选)
    pub record_id: Option<String>,  // 关联记录 (可选)

    // ===== 操作负载 =====
    pub payload_json: Option<JsonValue>, // 操作参数 (JSON)
    pub detail: Option<String>,          // 详细描述 / 原因
}

impl ActionLog {
    pub fn new(action_type: &str, actor: &str) -> Self {
        Self {
            action_id: uuid::Uuid::new_v4().to_string(),
            action_type: action_type.to_string(),
            action_ts: chrono::Local::now().naive_local(),
            actor: actor.to_string(),
            project_id: None,
            record_id: None,
            payload_json: None,
            detail: None,
        }
    }

    pub fn with_record(mut self, record_id: &str) -> Self {
        self.record_id = Some(record_id.to_string());
        self
    }

    pub fn with_payload(mut self, payload: JsonValue) -> Self {
        self.payload_json = Some(payload);
        self
    }

    pub fn with_detail(mut self, detail: &str) -> Self {
        self.detail = Some(detail.to_string());
        self
    }
}
