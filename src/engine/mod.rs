// ==========================================
// 工程材料检测数据系统 - 引擎层
// ==========================================
// 职责: 合规判定与生命周期业务规则, 全部为纯函数
// 红线: Engine 不拼 SQL, 不读时钟 (today 由调用方传入), 判定必须输出理由
// ==========================================

pub mod error;
pub mod retest_linkage;
pub mod review_workflow;
pub mod sample_lifecycle;
pub mod spec_resolver;
pub mod unit_calculator;

// 重导出核心引擎
pub use error::{EngineError, EngineResult};
pub use retest_linkage::RetestLinkage;
pub use review_workflow::{ReviewSelection, ReviewWorkflow};
pub use sample_lifecycle::SampleLifecycle;
pub use spec_resolver::{Judgement, SpecResolver};
pub use unit_calculator::{Computation, Targets, UnitCalculator};
