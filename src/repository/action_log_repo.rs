// ==========================================
// 工程材料检测数据系统 - 操作日志仓储
// ==========================================
// 职责: 管理 action_log 表
// 红线: Repository 不做业务逻辑, 只做数据映射; 审核流转等关键操作必须留痕
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::action_log::ActionLog;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

pub struct ActionLogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ActionLogRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        let repo = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        repo.ensure_table()?;
        Ok(repo)
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        let repo = Self { conn };
        repo.ensure_table()?;
        Ok(repo)
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 确保表存在（如果不存在则创建）
    fn ensure_table(&self) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS action_log (
              action_id TEXT PRIMARY KEY,
              action_type TEXT NOT NULL,
              action_ts TEXT NOT NULL,
              actor TEXT NOT NULL,
              project_id TEXT,
              record_id TEXT,
              payload_json TEXT,
              detail TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_action_log_ts
              ON action_log(action_ts DESC);
            CREATE INDEX IF NOT EXISTS idx_action_log_record
              ON action_log(record_id);
            "#,
        )?;
        Ok(())
    }

    fn row_to_log(row: &Row) -> SqliteResult<ActionLog> {
        let ts_s: String = row.get(2)?;
        let action_ts = NaiveDateTime::parse_from_str(&ts_s, "%Y-%m-%d %H:%M:%S").map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
        })?;
        let payload_s: Option<String> = row.get(6)?;
        let payload_json = match payload_s {
            Some(s) => Some(serde_json::from_str(&s).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    6,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?),
            None => None,
        };
        Ok(ActionLog {
            action_id: row.get(0)?,
            action_type: row.get(1)?,
            action_ts,
            actor: row.get(3)?,
            project_id: row.get(4)?,
            record_id: row.get(5)?,
            payload_json,
            detail: row.get(7)?,
        })
    }

    pub fn insert(&self, log: &ActionLog) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO action_log (
                action_id, action_type, action_ts, actor,
                project_id, record_id, payload_json, detail
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                log.action_id,
                log.action_type,
                log.action_ts.format("%Y-%m-%d %H:%M:%S").to_string(),
                log.actor,
                log.project_id,
                log.record_id,
                log.payload_json.as_ref().map(|v| v.to_string()),
                log.detail,
            ],
        )?;
        Ok(log.action_id.clone())
    }

    /// 最近的操作日志（按时间倒序）
    pub fn list_recent(&self, limit: usize) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT action_id, action_type, action_ts, actor,
                   project_id, record_id, payload_json, detail
            FROM action_log
            ORDER BY action_ts DESC
            LIMIT ?1
            "#,
        )?;
        let rows = stmt
            .query_map(params![limit as i64], Self::row_to_log)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    /// 某记录的操作轨迹（按时间正序）
    pub fn list_by_record(&self, record_id: &str) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT action_id, action_type, action_ts, actor,
                   project_id, record_id, payload_json, detail
            FROM action_log
            WHERE record_id = ?1
            ORDER BY action_ts ASC
            "#,
        )?;
        let rows = stmt
            .query_map(params![record_id], Self::row_to_log)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_insert_and_list_by_record() {
        let repo = ActionLogRepository::new(":memory:").expect("create repo");
        let log = ActionLog::new("SET_REVIEW_STATUS", "u2")
            .with_record("t1")
            .with_payload(json!({"from": "PENDING", "to": "APPROVED"}))
            .with_detail("批准检测记录");
        repo.insert(&log).expect("insert");

        let trail = repo.list_by_record("t1").expect("list");
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].action_type, "SET_REVIEW_STATUS");
        assert_eq!(
            trail[0].payload_json.as_ref().unwrap()["to"],
            json!("APPROVED")
        );
    }

    #[test]
    fn test_list_recent_respects_limit() {
        let repo = ActionLogRepository::new(":memory:").expect("create repo");
        for i in 0..5 {
            repo.insert(&ActionLog::new("EXPORT", "u2").with_detail(&format!("批次 {}", i)))
                .expect("insert");
        }
        let recent = repo.list_recent(3).expect("list");
        assert_eq!(recent.len(), 3);
    }
}
