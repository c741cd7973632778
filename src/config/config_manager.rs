// ==========================================
// 工程材料检测数据系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::sample::BreakItem;
use crate::domain::types::MaterialFamily;
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::HashMap;
use std::error::Error;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;
        let manager = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        manager.ensure_table()?;
        Ok(manager)
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }
        let manager = Self { conn };
        manager.ensure_table()?;
        Ok(manager)
    }

    fn ensure_table(&self) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS config_kv (
              scope_id TEXT NOT NULL DEFAULT 'global',
              key TEXT NOT NULL,
              value TEXT NOT NULL,
              PRIMARY KEY (scope_id, key)
            );
            "#,
        )?;
        Ok(())
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 的配置值 (UPSERT)
    pub fn set_global_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2",
            params![key, value],
        )?;
        Ok(())
    }

    /// 从 config_kv 表读取配置值，带默认值
    fn get_config_or_default(&self, key: &str, default: &str) -> Result<String, Box<dyn Error>> {
        Ok(self
            .get_config_value(key)?
            .unwrap_or_else(|| default.to_string()))
    }

    /// 获取所有 global 配置的快照（JSON格式, 用于导出报表抬头与问题排查）
    pub fn get_config_snapshot(&self) -> Result<String, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let mut config_map: HashMap<String, String> = HashMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        let json_value = json!(config_map);
        Ok(serde_json::to_string(&json_value)?)
    }

    // ===== 合格判定配置 =====

    /// 全局含水率容差 (%), 部位未配置带宽时的回退值
    pub fn get_legacy_moisture_tolerance(&self) -> Result<f64, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::LEGACY_MOISTURE_TOLERANCE, "3.0")?;
        Ok(value.parse::<f64>().unwrap_or(3.0))
    }

    // ===== 试样默认排程配置 =====

    /// 某材料大类的默认破型排程
    ///
    /// 配置格式为 JSON: [{"age_days":7,"count":1},{"age_days":28,"count":3}]
    /// 配置缺失或格式错误时退回行业默认排程。
    pub fn get_default_break_schedule(
        &self,
        family: MaterialFamily,
    ) -> Result<Vec<BreakItem>, Box<dyn Error>> {
        let key = match family {
            MaterialFamily::Grout => config_keys::BREAK_SCHEDULE_GROUT,
            _ => config_keys::BREAK_SCHEDULE_CONCRETE,
        };
        let fallback = Self::builtin_break_schedule(family);
        let Some(raw) = self.get_config_value(key)? else {
            return Ok(fallback);
        };
        let schedule: Vec<BreakItem> = serde_json::from_str(&raw).unwrap_or_else(|_| {
            tracing::warn!(
                config_key = key,
                raw_value = %raw,
                "破型排程配置格式错误, 使用内置默认排程"
            );
            fallback.clone()
        });
        if schedule.is_empty() {
            Ok(fallback)
        } else {
            Ok(schedule)
        }
    }

    /// 内置默认排程: 混凝土 7 天 x1 + 28 天 x3; 灌浆料 7 天 x1 + 28 天 x2
    fn builtin_break_schedule(family: MaterialFamily) -> Vec<BreakItem> {
        match family {
            MaterialFamily::Grout => vec![
                BreakItem {
                    age_days: 7,
                    count: 1,
                },
                BreakItem {
                    age_days: 28,
                    count: 2,
                },
            ],
            _ => vec![
                BreakItem {
                    age_days: 7,
                    count: 1,
                },
                BreakItem {
                    age_days: 28,
                    count: 3,
                },
            ],
        }
    }

    /// 某材料大类的默认试块规格
    pub fn get_default_cylinder_type(
        &self,
        family: MaterialFamily,
    ) -> Result<String, Box<dyn Error>> {
        let (key, default) = match family {
            MaterialFamily::Grout => (config_keys::CYLINDER_TYPE_GROUT, "2x2"),
            _ => (config_keys::CYLINDER_TYPE_CONCRETE, "4x8"),
        };
        self.get_config_or_default(key, default)
    }

    // ===== 审计配置 =====

    /// 启动摘要中列出的最近操作日志条数
    pub fn get_startup_digest_limit(&self) -> Result<usize, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::STARTUP_DIGEST_LIMIT, "10")?;
        Ok(value.parse::<usize>().unwrap_or(10))
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 合格判定
    pub const LEGACY_MOISTURE_TOLERANCE: &str = "legacy_moisture_tolerance";

    // 试样排程
    pub const BREAK_SCHEDULE_CONCRETE: &str = "break_schedule_concrete";
    pub const BREAK_SCHEDULE_GROUT: &str = "break_schedule_grout";
    pub const CYLINDER_TYPE_CONCRETE: &str = "cylinder_type_concrete";
    pub const CYLINDER_TYPE_GROUT: &str = "cylinder_type_grout";

    // 启动摘要
    pub const STARTUP_DIGEST_LIMIT: &str = "startup_digest_limit";
}
