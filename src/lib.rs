// ==========================================
// 工程材料检测数据系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 现场检测数据的判定、审核与导出核心 (人工最终控制权)
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 状态装配与会话身份
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    ActivityKind, Actor, ExportFormat, MaterialFamily, ReviewStatus, Role, SampleStatus,
    ScheduleStatus, Verdict,
};

// 领域实体
pub use domain::{
    ActionLog, ActivityRecord, BreakItem, Cylinder, DerivedResult, FieldTestResult, RawReadings,
    RetestLink, Sample, Specification,
};

// 引擎
pub use engine::{
    Computation, Judgement, RetestLinkage, ReviewSelection, ReviewWorkflow, SampleLifecycle,
    SpecResolver, Targets, UnitCalculator,
};

// API
pub use api::{ActivityApi, FieldTestApi, ReviewApi, SampleApi, SpecApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "工程材料检测数据系统";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
