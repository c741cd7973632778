// ==========================================
// 工程材料检测数据系统 - API 层
// ==========================================
// 职责: 提供业务 API 接口, 供上层调用
// ==========================================

pub mod activity_api;
pub mod error;
pub mod export;
pub mod field_test_api;
pub mod review_api;
pub mod sample_api;
pub mod spec_api;

// 重导出核心类型
pub use activity_api::{ActivityApi, ActivityEdit, NewActivity};
pub use error::{ApiError, ApiResult};
pub use export::{ExportArtifact, ExportRenderer, ExportRequest, LoggingExportRenderer};
pub use field_test_api::{FieldTestApi, FieldTestEdit, NewFieldTest};
pub use review_api::{ReviewApi, ReviewTarget};
pub use sample_api::{BreakOutcome, DueItem, NewSample, SampleApi};
pub use spec_api::{SpecApi, SpecFields};
