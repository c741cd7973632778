// ==========================================
// 工程材料检测数据系统 - 应用层
// ==========================================
// 职责: 应用状态管理与会话身份
// ==========================================

pub mod session;
pub mod state;

pub use session::{ActorProvider, FixedActorProvider};
pub use state::{get_default_db_path, AppState};
