// ==========================================
// 工程材料检测数据系统 - 引擎层错误类型
// ==========================================
// 职责: 业务规则错误, 全部为调用方可恢复错误
// 红线: 每类错误对应不同的前端纠正动作, 不得合并为笼统失败
// 工具: thiserror 派生宏
// ==========================================

use crate::domain::types::{MaterialFamily, ReviewStatus};
use thiserror::Error;

/// 引擎层错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    // ===== 计算错误 =====
    #[error("无法计算: {reason}")]
    NotComputable { reason: String },

    // ===== 规格解析错误 =====
    #[error("未找到检测规格: project={project_id}, family={material_family}, location={location}")]
    SpecNotFound {
        project_id: String,
        material_family: MaterialFamily,
        location: String,
    },

    // ===== 审核状态机错误 =====
    #[error("无效的审核状态转换: from={from} to={to}")]
    InvalidTransition { from: ReviewStatus, to: ReviewStatus },

    #[error("无审核权限: actor={actor}")]
    Forbidden { actor: String },

    #[error("记录已批准锁定, 禁止编辑: record_id={record_id}")]
    LockedRecord { record_id: String },

    // ===== 试样生命周期错误 =====
    #[error("试块不属于该试样: sample_id={sample_id}, cylinder_id={cylinder_id}")]
    InvalidCylinder {
        sample_id: String,
        cylinder_id: String,
    },

    #[error("试块已有实测强度, 破型结果不可覆盖: cylinder_id={cylinder_id}")]
    DuplicateBreak { cylinder_id: String },

    // ===== 复测链错误 =====
    #[error("记录已有复测出边: test_id={test_id}")]
    AlreadyLinked { test_id: String },

    #[error("记录不能复测自身: test_id={test_id}")]
    SelfLink { test_id: String },

    #[error("复测链存在环: test_id={test_id}")]
    CycleDetected { test_id: String },

    #[error("复测与原记录不匹配: {reason}")]
    MismatchedRetest { reason: String },

    // ===== 批量操作错误 =====
    #[error("导出选择集为空")]
    EmptySelection,
}

/// Result 类型别名
pub type EngineResult<T> = Result<T, EngineError>;
