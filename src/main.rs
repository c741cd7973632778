// ==========================================
// 工程材料检测数据系统 - 主入口
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 现场检测数据的判定、审核与导出核心
// ==========================================

use chrono::Local;
use cmt_fieldops::app::{get_default_db_path, AppState};
use cmt_fieldops::logging;

fn main() {
    // 初始化日志系统
    logging::init();

    tracing::info!("==================================================");
    tracing::info!("{}", cmt_fieldops::APP_NAME);
    tracing::info!("系统版本: {}", cmt_fieldops::VERSION);
    tracing::info!("==================================================");

    // 获取数据库路径
    let db_path = get_default_db_path();
    tracing::info!("使用数据库: {}", db_path);

    // 创建AppState
    let app_state = match AppState::new(db_path) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("无法初始化AppState: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = print_startup_digest(&app_state) {
        tracing::error!("启动摘要生成失败: {}", e);
        std::process::exit(1);
    }
}

/// 启动摘要: 待审核队列 / 到期试块 / 最近操作
fn print_startup_digest(state: &AppState) -> Result<(), String> {
    let today = Local::now().date_naive();

    let pending = state
        .review_api
        .pending_tests()
        .map_err(|e| format!("待审核队列查询失败: {}", e))?;
    tracing::info!("待审核检测记录: {} 条", pending.len());

    let due = state
        .sample_api
        .due_overview(today)
        .map_err(|e| format!("试块到期查询失败: {}", e))?;
    tracing::info!("未完成试样: {} 个", due.len());
    for item in &due {
        tracing::info!(
            "  [{}] {} @ {} 下次破型: {:?} ({})",
            item.status,
            item.sample_no,
            item.location,
            item.next_due,
            item.project_id
        );
    }

    let limit = state
        .config
        .get_startup_digest_limit()
        .map_err(|e| format!("启动摘要配置读取失败: {}", e))?;
    let recent = state
        .action_log_repo
        .list_recent(limit)
        .map_err(|e| format!("操作日志查询失败: {}", e))?;
    tracing::info!("最近操作 ({} 条):", recent.len());
    for log in &recent {
        tracing::info!(
            "  {} {} by {} record={:?}",
            log.action_ts,
            log.action_type,
            log.actor,
            log.record_id
        );
    }

    Ok(())
}
