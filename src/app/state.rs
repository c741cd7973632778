// ==========================================
// 工程材料检测数据系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// 说明: 所有仓储共享同一个 SQLite 连接, 保证乐观锁语义在进程内一致
// ==========================================

use rusqlite::Connection;
use std::sync::{Arc, Mutex};

use crate::api::{
    ActivityApi, ExportRenderer, FieldTestApi, LoggingExportRenderer, ReviewApi, SampleApi,
    SpecApi,
};
use crate::config::ConfigManager;
use crate::db::configure_sqlite_connection;
use crate::repository::{
    ActionLogRepository, ActivityRepository, FieldTestRepository, RetestRepository,
    SampleRepository, SpecRepository,
};

/// 应用状态
///
/// 包含所有API实例和共享资源
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 规格管理API
    pub spec_api: Arc<SpecApi>,

    /// 现场检测API
    pub field_test_api: Arc<FieldTestApi>,

    /// 试样API
    pub sample_api: Arc<SampleApi>,

    /// 活动记录API
    pub activity_api: Arc<ActivityApi>,

    /// 审核API
    pub review_api: Arc<ReviewApi>,

    /// 操作日志仓储（用于审计追踪与启动摘要）
    pub action_log_repo: Arc<ActionLogRepository>,

    /// 配置管理器
    pub config: Arc<ConfigManager>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 说明
    /// 该方法会：
    /// 1. 打开共享数据库连接并幂等建表
    /// 2. 初始化所有Repository
    /// 3. 创建所有API实例 (默认使用日志导出渲染器)
    pub fn new(db_path: String) -> Result<Self, String> {
        Self::with_renderer(db_path, Arc::new(LoggingExportRenderer))
    }

    /// 注入自定义导出渲染方创建AppState
    pub fn with_renderer(
        db_path: String,
        renderer: Arc<dyn ExportRenderer>,
    ) -> Result<Self, String> {
        tracing::info!("初始化AppState, 数据库路径: {}", db_path);

        // 创建数据库连接（共享连接）
        let conn = Connection::open(&db_path).map_err(|e| format!("无法打开数据库: {}", e))?;
        configure_sqlite_connection(&conn).map_err(|e| format!("无法配置数据库连接: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 初始化Repository层
        // ==========================================
        let spec_repo = Arc::new(
            SpecRepository::from_connection(conn.clone())
                .map_err(|e| format!("无法创建SpecRepository: {}", e))?,
        );
        let field_test_repo = Arc::new(
            FieldTestRepository::from_connection(conn.clone())
                .map_err(|e| format!("无法创建FieldTestRepository: {}", e))?,
        );
        let sample_repo = Arc::new(
            SampleRepository::from_connection(conn.clone())
                .map_err(|e| format!("无法创建SampleRepository: {}", e))?,
        );
        let retest_repo = Arc::new(
            RetestRepository::from_connection(conn.clone())
                .map_err(|e| format!("无法创建RetestRepository: {}", e))?,
        );
        let activity_repo = Arc::new(
            ActivityRepository::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ActivityRepository: {}", e))?,
        );
        let action_log_repo = Arc::new(
            ActionLogRepository::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ActionLogRepository: {}", e))?,
        );

        // 配置管理器
        let config = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );

        // ==========================================
        // 初始化API层
        // ==========================================
        let spec_api = Arc::new(SpecApi::new(
            spec_repo.clone(),
            field_test_repo.clone(),
            action_log_repo.clone(),
        ));
        let field_test_api = Arc::new(FieldTestApi::new(
            field_test_repo.clone(),
            spec_repo.clone(),
            retest_repo.clone(),
            action_log_repo.clone(),
            config.clone(),
        ));
        let sample_api = Arc::new(SampleApi::new(
            sample_repo.clone(),
            action_log_repo.clone(),
            config.clone(),
        ));
        let activity_api = Arc::new(ActivityApi::new(
            activity_repo.clone(),
            action_log_repo.clone(),
        ));
        let review_api = Arc::new(ReviewApi::new(
            field_test_repo,
            sample_repo,
            activity_repo,
            action_log_repo.clone(),
            renderer,
        ));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            spec_api,
            field_test_api,
            sample_api,
            activity_api,
            review_api,
            action_log_repo,
            config,
        })
    }

    /// 获取数据库路径
    pub fn get_db_path(&self) -> &str {
        &self.db_path
    }
}

// ==========================================
// 默认数据库路径辅助函数
// ==========================================

/// 获取默认数据库路径
///
/// # 返回
/// - 开发环境: 用户数据目录/cmt-fieldops-dev/cmt_fieldops.db
/// - 生产环境: 用户数据目录/cmt-fieldops/cmt_fieldops.db
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    // 允许通过环境变量显式指定 DB 路径（便于调试/测试/CI）
    if let Ok(path) = std::env::var("FIELDOPS_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    // 先给一个默认回退值，后续如果能拿到 data_dir 再覆盖。
    let mut path = PathBuf::from("./cmt_fieldops.db");

    if let Some(data_dir) = dirs::data_dir() {
        // 开发环境使用独立目录，避免污染生产数据
        #[cfg(debug_assertions)]
        {
            path = data_dir.join("cmt-fieldops-dev");
        }

        #[cfg(not(debug_assertions))]
        {
            path = data_dir.join("cmt-fieldops");
        }

        // 确保目录存在
        std::fs::create_dir_all(&path).ok();
        path = path.join("cmt_fieldops.db");
    }

    path.to_string_lossy().to_string()
}
