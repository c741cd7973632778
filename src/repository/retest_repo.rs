// ==========================================
// 工程材料检测数据系统 - 复测链仓储
// ==========================================
// 职责: 管理 retest_link 表 (有向取代边)
// 约束: failing_test_id 唯一, 数据库层保证每条记录最多一条出边
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::retest::RetestLink;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

pub struct RetestRepository {
    conn: Arc<Mutex<Connection>>,
}

impl RetestRepository {
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
            CREATE TABLE IF NOT EXISTS retest_link (
              link_id TEXT PRIMARY KEY,
              failing_test_id TEXT NOT NULL UNIQUE,
              retest_test_id TEXT NOT NULL,
              created_at TEXT NOT NULL DEFAULT (datetime('now')),
              created_by TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_retest_target
              ON retest_link(retest_test_id);
            "#,
        )?;
        Ok(())
    }

    fn row_to_link(row: &Row) -> SqliteResult<RetestLink> {
        Ok(RetestLink {
            link_id: row.get(0)?,
            failing_test_id: row.get(1)?,
            retest_test_id: row.get(2)?,
            created_at: row.get(3)?,
            created_by: row.get(4)?,
        })
    }

    pub fn insert(&self, link: &RetestLink) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO retest_link (link_id, failing_test_id, retest_test_id, created_at, created_by)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                link.link_id,
                link.failing_test_id,
                link.retest_test_id,
                link.created_at,
                link.created_by,
            ],
        )?;
        Ok(())
    }

    /// 全量链接 (供引擎做环检测与链遍历)
    pub fn list_all(&self) -> RepositoryResult<Vec<RetestLink>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT link_id, failing_test_id, retest_test_id, created_at, created_by
            FROM retest_link
            ORDER BY created_at ASC
            "#,
        )?;
        let rows = stmt
            .query_map([], Self::row_to_link)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    /// 某记录的出边 (其复测记录)
    pub fn find_by_failing(&self, failing_test_id: &str) -> RepositoryResult<Option<RetestLink>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT link_id, failing_test_id, retest_test_id, created_at, created_by
            FROM retest_link
            WHERE failing_test_id = ?1
            "#,
        )?;
        let result = stmt.query_row(params![failing_test_id], Self::row_to_link);
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_list() {
        let repo = RetestRepository::new(":memory:").expect("create repo");
        let link = RetestLink::new("t1".to_string(), "t2".to_string(), "u2".to_string());
        repo.insert(&link).expect("insert");

        let all = repo.list_all().expect("list");
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].failing_test_id, "t1");
        assert_eq!(all[0].retest_test_id, "t2");
    }

    #[test]
    fn test_one_outgoing_edge_enforced_by_db() {
        let repo = RetestRepository::new(":memory:").expect("create repo");
        repo.insert(&RetestLink::new(
            "t1".to_string(),
            "t2".to_string(),
            "u2".to_string(),
        ))
        .expect("insert");
        let err = repo
            .insert(&RetestLink::new(
                "t1".to_string(),
                "t3".to_string(),
                "u2".to_string(),
            ))
            .unwrap_err();
        assert!(matches!(err, RepositoryError::UniqueConstraintViolation(_)));
    }

    #[test]
    fn test_find_by_failing() {
        let repo = RetestRepository::new(":memory:").expect("create repo");
        assert!(repo.find_by_failing("t1").expect("find").is_none());
        repo.insert(&RetestLink::new(
            "t1".to_string(),
            "t2".to_string(),
            "u2".to_string(),
        ))
        .expect("insert");
        let found = repo.find_by_failing("t1").expect("find").expect("exists");
        assert_eq!(found.retest_test_id, "t2");
    }
}
