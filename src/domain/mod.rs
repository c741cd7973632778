// ==========================================
// 工程材料检测数据系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、业务规则接口
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod action_log;
pub mod activity;
pub mod retest;
pub mod sample;
pub mod specification;
pub mod types;

// 重导出核心类型
pub use action_log::ActionLog;
pub use activity::ActivityRecord;
pub use field_test::{DerivedResult, FieldTestResult, RawReadings};
pub use retest::RetestLink;
pub use sample::{BreakItem, Cylinder, Sample};
pub use specification::{Specification, MAX_LOCATIONS_PER_PROJECT_FAMILY};
pub use types::{
    ActivityKind, Actor, ExportFormat, MaterialFamily, ReviewStatus, Role, SampleStatus,
    ScheduleStatus, Verdict,
};
