// ==========================================
// 工程材料检测数据系统 - 复测链实体
// ==========================================
// 职责: 不合格检测 -> 后续复测的有向取代边
// 约束: 每条记录最多一条出边; 复测必须同材料大类同部位
// ==========================================

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 复测取代边: failing_test_id 被 retest_test_id 取代
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetestLink {
    pub link_id: String,
    pub failing_test_id: String,
    pub retest_test_id: String,
    pub created_at: String,
    pub created_by: String,
}

impl RetestLink {
    pub fn new(failing_test_id: String, retest_test_id: String, created_by: String) -> Self {
        Self {
            link_id: Uuid::new_v4().to_string(),
            failing_test_id,
            retest_test_id,
            created_at: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            created_by,
        }
    }
}
