// ==========================================
// 工程材料检测数据系统 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型, 转换 Repository/Engine 错误为用户友好的错误消息
// 红线: 每类错误对应不同的前端纠正动作, 不得合并为笼统失败
// ==========================================

use crate::engine::error::EngineError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
/// 所有错误信息必须包含显式原因
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    #[error("无法计算: {0}")]
    NotComputable(String),

    #[error("未找到检测规格: {0}")]
    SpecNotFound(String),

    // ==========================================
    // 审核工作流错误
    // ==========================================
    #[error("无效的审核状态转换: from={from} to={to}")]
    InvalidTransition { from: String, to: String },

    #[error("无审核权限: {0}")]
    Forbidden(String),

    #[error("记录已批准锁定: {0}")]
    LockedRecord(String),

    #[error("导出选择集为空")]
    EmptySelection,

    // ==========================================
    // 试样生命周期错误
    // ==========================================
    #[error("试块不属于该试样: {0}")]
    InvalidCylinder(String),

    #[error("试块已有实测强度, 破型结果不可覆盖: {0}")]
    DuplicateBreak(String),

    // ==========================================
    // 复测链错误
    // ==========================================
    #[error("记录已有复测出边: {0}")]
    AlreadyLinked(String),

    #[error("记录不能复测自身: {0}")]
    SelfLink(String),

    #[error("复测链存在环: {0}")]
    CycleDetected(String),

    #[error("复测与原记录不匹配: {0}")]
    MismatchedRetest(String),

    // ==========================================
    // 并发控制错误
    // ==========================================
    #[error("记录已被他人修改: {0}")]
    StaleRecord(String),

    // ==========================================
    // 数据访问与外部协作错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("存储不可用: {0}")]
    StorageUnavailable(String),

    #[error("导出失败: {0}")]
    ExportFailed(String),

    #[error("数据验证失败: {0}")]
    ValidationError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// 从 RepositoryError 转换
// 目的: 将Repository层的技术错误转换为用户友好的业务错误
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            // 并发控制错误
            RepositoryError::StaleRecord {
                record_id,
                expected,
            } => ApiError::StaleRecord(format!(
                "记录{}已被其他用户修改 (期望record_rev={})",
                record_id, expected
            )),

            // 数据库错误
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseConnectionError(msg) => ApiError::StorageUnavailable(msg),
            RepositoryError::LockError(msg) => {
                ApiError::StorageUnavailable(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("外键约束违反: {}", msg))
            }

            // 业务规则错误
            RepositoryError::BusinessRuleViolation(msg) => ApiError::BusinessRuleViolation(msg),

            // 数据质量错误
            RepositoryError::ValidationError(msg) => ApiError::ValidationError(msg),
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }

            // 通用错误
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 EngineError 转换
// ==========================================
impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::NotComputable { reason } => ApiError::NotComputable(reason),
            EngineError::SpecNotFound {
                project_id,
                material_family,
                location,
            } => ApiError::SpecNotFound(format!(
                "project={}, family={}, location={}",
                project_id, material_family, location
            )),
            EngineError::InvalidTransition { from, to } => ApiError::InvalidTransition {
                from: from.to_string(),
                to: to.to_string(),
            },
            EngineError::Forbidden { actor } => ApiError::Forbidden(actor),
            EngineError::LockedRecord { record_id } => ApiError::LockedRecord(record_id),
            EngineError::EmptySelection => ApiError::EmptySelection,
            EngineError::InvalidCylinder {
                sample_id,
                cylinder_id,
            } => ApiError::InvalidCylinder(format!(
                "sample={}, cylinder={}",
                sample_id, cylinder_id
            )),
            EngineError::DuplicateBreak { cylinder_id } => ApiError::DuplicateBreak(cylinder_id),
            EngineError::AlreadyLinked { test_id } => ApiError::AlreadyLinked(test_id),
            EngineError::SelfLink { test_id } => ApiError::SelfLink(test_id),
            EngineError::CycleDetected { test_id } => ApiError::CycleDetected(test_id),
            EngineError::MismatchedRetest { reason } => ApiError::MismatchedRetest(reason),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
