// ==========================================
// 工程材料检测数据系统 - 活动记录仓储
// ==========================================
// 职责: 管理 activity_record 表 (DFR / 专项检查)
// 并发: 记录级乐观锁, 与检测记录同一套 record_rev 约定
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::activity::ActivityRecord;
use crate::domain::types::{ActivityKind, ReviewStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

pub struct ActivityRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ActivityRepository {
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
            CREATE TABLE IF NOT EXISTS activity_record (
              activity_id TEXT PRIMARY KEY,
              project_id TEXT NOT NULL,
              kind TEXT NOT NULL,
              activity_date TEXT NOT NULL,
              inspector TEXT NOT NULL,
              narrative TEXT NOT NULL,
              attachment_count INTEGER NOT NULL DEFAULT 0,
              review_status TEXT NOT NULL DEFAULT 'PENDING',
              record_rev INTEGER NOT NULL DEFAULT 1,
              created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX IF NOT EXISTS idx_activity_project
              ON activity_record(project_id, activity_date DESC);
            CREATE INDEX IF NOT EXISTS idx_activity_review
              ON activity_record(review_status);
            "#,
        )?;
        Ok(())
    }

    fn row_to_activity(row: &Row) -> SqliteResult<ActivityRecord> {
        let kind_s: String = row.get(2)?;
        let kind = ActivityKind::from_str(&kind_s).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                format!("未知活动类型: {}", kind_s).into(),
            )
        })?;
        let date_s: String = row.get(3)?;
        let activity_date = NaiveDate::parse_from_str(&date_s, "%Y-%m-%d").map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?;
        let status_s: String = row.get(7)?;
        let review_status = ReviewStatus::from_str(&status_s).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                7,
                rusqlite::types::Type::Text,
                format!("未知审核状态: {}", status_s).into(),
            )
        })?;
        Ok(ActivityRecord {
            activity_id: row.get(0)?,
            project_id: row.get(1)?,
            kind,
            activity_date,
            inspector: row.get(4)?,
            narrative: row.get(5)?,
            attachment_count: row.get(6)?,
            review_status,
            record_rev: row.get(8)?,
            created_at: row.get(9)?,
        })
    }

    const SELECT_COLUMNS: &'static str = r#"
        activity_id, project_id, kind, activity_date, inspector, narrative,
        attachment_count, review_status, record_rev, created_at
    "#;

    pub fn insert(&self, activity: &ActivityRecord) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO activity_record (
                activity_id, project_id, kind, activity_date, inspector, narrative,
                attachment_count, review_status, record_rev, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                activity.activity_id,
                activity.project_id,
                activity.kind.to_db_str(),
                activity.activity_date.format("%Y-%m-%d").to_string(),
                activity.inspector,
                activity.narrative,
                activity.attachment_count,
                activity.review_status.to_db_str(),
                activity.record_rev,
                activity.created_at,
            ],
        )?;
        Ok(())
    }

    pub fn find_by_id(&self, activity_id: &str) -> RepositoryResult<Option<ActivityRecord>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM activity_record WHERE activity_id = ?1",
            Self::SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let result = stmt.query_row(params![activity_id], Self::row_to_activity);
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn list_by_project(&self, project_id: &str) -> RepositoryResult<Vec<ActivityRecord>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {} FROM activity_record
            WHERE project_id = ?1
            ORDER BY activity_date DESC
            "#,
            Self::SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![project_id], Self::row_to_activity)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    /// 乐观锁更新叙述与附件数
    pub fn update_guarded(&self, activity: &ActivityRecord) -> RepositoryResult<ActivityRecord> {
        let affected = {
            let conn = self.get_conn()?;
            conn.execute(
                r#"
                UPDATE activity_record SET
                    activity_date = ?1,
                    inspector = ?2,
                    narrative = ?3,
                    attachment_count = ?4,
                    review_status = ?5,
                    record_rev = record_rev + 1
                WHERE activity_id = ?6 AND record_rev = ?7
                "#,
                params![
                    activity.activity_date.format("%Y-%m-%d").to_string(),
                    activity.inspector,
                    activity.narrative,
                    activity.attachment_count,
                    activity.review_status.to_db_str(),
                    activity.activity_id,
                    activity.record_rev,
                ],
            )?
        };
        if affected == 0 {
            return match self.find_by_id(&activity.activity_id)? {
                Some(_) => Err(RepositoryError::StaleRecord {
                    record_id: activity.activity_id.clone(),
                    expected: activity.record_rev,
                }),
                None => Err(RepositoryError::NotFound {
                    entity: "ActivityRecord".to_string(),
                    id: activity.activity_id.clone(),
                }),
            };
        }
        let mut updated = activity.clone();
        updated.record_rev += 1;
        Ok(updated)
    }

    /// 乐观锁更新审核状态
    pub fn set_review_status(
        &self,
        activity_id: &str,
        status: ReviewStatus,
        expected_rev: i32,
    ) -> RepositoryResult<()> {
        let affected = {
            let conn = self.get_conn()?;
            conn.execute(
                r#"
                UPDATE activity_record
                SET review_status = ?1, record_rev = record_rev + 1
                WHERE activity_id = ?2 AND record_rev = ?3
                "#,
                params![status.to_db_str(), activity_id, expected_rev],
            )?
        };
        if affected == 0 {
            return match self.find_by_id(activity_id)? {
                Some(_) => Err(RepositoryError::StaleRecord {
                    record_id: activity_id.to_string(),
                    expected: expected_rev,
                }),
                None => Err(RepositoryError::NotFound {
                    entity: "ActivityRecord".to_string(),
                    id: activity_id.to_string(),
                }),
            };
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_activity() -> ActivityRecord {
        ActivityRecord::new(
            "J-24-101".to_string(),
            ActivityKind::Dfr,
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            "Alex Field".to_string(),
            "Observed subgrade preparation at Building Pad.".to_string(),
        )
    }

    #[test]
    fn test_insert_and_list() {
        let repo = ActivityRepository::new(":memory:").expect("create repo");
        let a = make_activity();
        repo.insert(&a).expect("insert");

        let list = repo.list_by_project("J-24-101").expect("list");
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].kind, ActivityKind::Dfr);
        assert_eq!(list[0].attachment_count, 0);
    }

    #[test]
    fn test_update_guarded() {
        let repo = ActivityRepository::new(":memory:").expect("create repo");
        let a = make_activity();
        repo.insert(&a).expect("insert");

        let mut edited = a.clone();
        edited.attachment_count = 3;
        let updated = repo.update_guarded(&edited).expect("update");
        assert_eq!(updated.record_rev, 2);

        let err = repo.update_guarded(&edited).unwrap_err();
        assert!(matches!(err, RepositoryError::StaleRecord { .. }));
    }
}
