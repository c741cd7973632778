// ==========================================
// 工程材料检测数据系统 - 配置层
// ==========================================
// 职责: 系统配置管理 (判定容差 / 默认排程)
// 存储: config_kv 表
// ==========================================

pub mod config_manager;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager};
