// ==========================================
// 工程材料检测数据系统 - 领域类型定义
// ==========================================
// 依据: QA_Review_Workflow.md - 审核状态机
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 材料大类 (Material Family)
// ==========================================
// 现场密度试验: SOIL / ASPHALT
// 实验室龄期试验: CONCRETE / GROUT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MaterialFamily {
    Soil,     // 土方/级配料
    Asphalt,  // 沥青
    Concrete, // 混凝土
    Grout,    // 灌浆料
}

impl MaterialFamily {
    /// 是否为实验室养护类材料（按龄期破型）
    pub fn is_lab_cured(&self) -> bool {
        matches!(self, MaterialFamily::Concrete | MaterialFamily::Grout)
    }

    /// 从字符串解析材料大类
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "SOIL" => Some(MaterialFamily::Soil),
            "ASPHALT" => Some(MaterialFamily::Asphalt),
            "CONCRETE" => Some(MaterialFamily::Concrete),
            "GROUT" => Some(MaterialFamily::Grout),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            MaterialFamily::Soil => "SOIL",
            MaterialFamily::Asphalt => "ASPHALT",
            MaterialFamily::Concrete => "CONCRETE",
            MaterialFamily::Grout => "GROUT",
        }
    }
}

impl fmt::Display for MaterialFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 判定结果 (Verdict)
// ==========================================
// 红线: 判定结果是(原始读数, 规格)的纯函数, 不得独立存储后失去可复算性
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Pass, // 合格
    Fail, // 不合格
}

impl Verdict {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PASS" => Some(Verdict::Pass),
            "FAIL" => Some(Verdict::Fail),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            Verdict::Pass => "PASS",
            Verdict::Fail => "FAIL",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 审核状态 (Review Status)
// ==========================================
// 状态机: PENDING -> APPROVED / REJECTED; 重新裁定必须先解锁回 PENDING
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewStatus {
    Pending,  // 待审核
    Approved, // 已批准(锁定)
    Rejected, // 已驳回
}

impl ReviewStatus {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PENDING" => Some(ReviewStatus::Pending),
            "APPROVED" => Some(ReviewStatus::Approved),
            "REJECTED" => Some(ReviewStatus::Rejected),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            ReviewStatus::Pending => "PENDING",
            ReviewStatus::Approved => "APPROVED",
            ReviewStatus::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 试样状态 (Sample Status)
// ==========================================
// 派生状态: 所有试块均有实测强度 -> COMPLETED, 否则 PENDING
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SampleStatus {
    Pending,   // 尚有待破型试块
    Completed, // 全部龄期已完成
}

impl SampleStatus {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            SampleStatus::Pending => "PENDING",
            SampleStatus::Completed => "COMPLETED",
        }
    }
}

impl fmt::Display for SampleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 破型排程状态 (Schedule Status)
// ==========================================
// 相对 today 比较 next_due: 之前 -> OVERDUE, 当天 -> DUE_TODAY, 之后 -> SCHEDULED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScheduleStatus {
    Complete,  // 全部实测完成
    Overdue,   // 已逾期
    DueToday,  // 今日到期
    Scheduled, // 按期排程中
}

impl fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleStatus::Complete => write!(f, "COMPLETE"),
            ScheduleStatus::Overdue => write!(f, "OVERDUE"),
            ScheduleStatus::DueToday => write!(f, "DUE_TODAY"),
            ScheduleStatus::Scheduled => write!(f, "SCHEDULED"),
        }
    }
}

// ==========================================
// 用户角色 (Role)
// ==========================================
// 依据: 会话提供方接口 - 仅 MANAGER/ADMIN 具备审核权限
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Employee, // 现场检测员
    Manager,  // 项目经理(审核)
    Admin,    // 系统管理员
}

impl Role {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "EMPLOYEE" => Some(Role::Employee),
            "MANAGER" => Some(Role::Manager),
            "ADMIN" => Some(Role::Admin),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            Role::Employee => "EMPLOYEE",
            Role::Manager => "MANAGER",
            Role::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 当前操作人 (Actor)
// ==========================================
/// 由外部会话提供方注入的当前用户信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub actor_id: String,
    pub display_name: String,
    pub role: Role,
}

impl Actor {
    /// 是否具备审核(批准/驳回/解锁)权限
    pub fn can_review(&self) -> bool {
        matches!(self.role, Role::Manager | Role::Admin)
    }
}

// ==========================================
// 导出格式 (Export Format)
// ==========================================
// 渲染由外部协作方负责, 核心仅传递经校验的选择集
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExportFormat {
    Excel,
    Pdf,
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Excel => write!(f, "EXCEL"),
            ExportFormat::Pdf => write!(f, "PDF"),
        }
    }
}

// ==========================================
// 活动记录类型 (Activity Kind)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityKind {
    Dfr,     // 每日现场报告 (Daily Field Report)
    Special, // 专项检查
}

impl ActivityKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "DFR" => Some(ActivityKind::Dfr),
            "SPECIAL" => Some(ActivityKind::Special),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            ActivityKind::Dfr => "DFR",
            ActivityKind::Special => "SPECIAL",
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_material_family_roundtrip() {
        for family in [
            MaterialFamily::Soil,
            MaterialFamily::Asphalt,
            MaterialFamily::Concrete,
            MaterialFamily::Grout,
        ] {
            assert_eq!(MaterialFamily::from_str(family.to_db_str()), Some(family));
        }
        assert_eq!(MaterialFamily::from_str("soil"), Some(MaterialFamily::Soil));
        assert_eq!(MaterialFamily::from_str("STEEL"), None);
    }

    #[test]
    fn test_lab_cured_families() {
        assert!(MaterialFamily::Concrete.is_lab_cured());
        assert!(MaterialFamily::Grout.is_lab_cured());
        assert!(!MaterialFamily::Soil.is_lab_cured());
        assert!(!MaterialFamily::Asphalt.is_lab_cured());
    }

    #[test]
    fn test_actor_review_capability() {
        let employee = Actor {
            actor_id: "u1".to_string(),
            display_name: "Alex Field".to_string(),
            role: Role::Employee,
        };
        let manager = Actor {
            actor_id: "u2".to_string(),
            display_name: "Sarah Engineer".to_string(),
            role: Role::Manager,
        };
        assert!(!employee.can_review());
        assert!(manager.can_review());
    }

    #[test]
    fn test_review_status_parse() {
        assert_eq!(ReviewStatus::from_str("approved"), Some(ReviewStatus::Approved));
        assert_eq!(ReviewStatus::from_str("UNKNOWN"), None);
    }
}
