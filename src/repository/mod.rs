// ==========================================
// 工程材料检测数据系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// 职责: 提供数据访问接口, 屏蔽数据库细节
// 约束: 所有查询使用参数化, 防止 SQL 注入
// ==========================================

pub mod action_log_repo;
pub mod activity_repo;
pub mod error;
pub mod field_test_repo;
pub mod retest_repo;
pub mod sample_repo;
pub mod spec_repo;

// 重导出核心仓储
pub use action_log_repo::ActionLogRepository;
pub use activity_repo::ActivityRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use field_test_repo::FieldTestRepository;
pub use retest_repo::RetestRepository;
pub use sample_repo::SampleRepository;
pub use spec_repo::SpecRepository;
