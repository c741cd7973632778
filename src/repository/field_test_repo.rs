// ==========================================
// 工程材料检测数据系统 - 现场检测记录仓储
// ==========================================
// 职责: 管理 field_test_result 表
// 并发: 单记录乐观锁, 所有 UPDATE 必须带 record_rev 守卫
// 红线: 记录不提供物理删除
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::field_test::{DerivedResult, FieldTestResult, RawReadings};
use crate::domain::types::{MaterialFamily, ReviewStatus, Verdict};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

pub struct FieldTestRepository {
    conn: Arc<Mutex<Connection>>,
}

impl FieldTestRepository {
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
            CREATE TABLE IF NOT EXISTS field_test_result (
              test_id TEXT PRIMARY KEY,
              test_no TEXT NOT NULL,
              project_id TEXT NOT NULL,
              material_family TEXT NOT NULL,
              location TEXT NOT NULL,
              elevation TEXT,
              test_date TEXT NOT NULL,
              inspector TEXT NOT NULL,
              gauge_number TEXT,
              spec_id TEXT NOT NULL,
              spec_revision INTEGER NOT NULL,
              wet_density REAL,
              moisture_pct REAL,
              measured_psi REAL,
              derived_value REAL NOT NULL,
              percent REAL NOT NULL,
              verdict TEXT NOT NULL,
              review_status TEXT NOT NULL DEFAULT 'PENDING',
              record_rev INTEGER NOT NULL DEFAULT 1,
              created_by TEXT NOT NULL,
              created_at TEXT NOT NULL DEFAULT (datetime('now')),
              updated_at TEXT NOT NULL DEFAULT (datetime('now')),
              UNIQUE(project_id, test_no)
            );

            CREATE INDEX IF NOT EXISTS idx_field_test_project
              ON field_test_result(project_id, test_date DESC);
            CREATE INDEX IF NOT EXISTS idx_field_test_review
              ON field_test_result(review_status);
            CREATE INDEX IF NOT EXISTS idx_field_test_spec
              ON field_test_result(spec_id);
            "#,
        )?;
        Ok(())
    }

    const SELECT_COLUMNS: &'static str = r#"
        test_id, test_no, project_id, material_family, location, elevation,
        test_date, inspector, gauge_number,
        spec_id, spec_revision,
        wet_density, moisture_pct, measured_psi,
        derived_value, percent, verdict,
        review_status, record_rev,
        created_by, created_at, updated_at
    "#;

    fn row_to_test(row: &Row) -> SqliteResult<FieldTestResult> {
        let family_s: String = row.get(3)?;
        let material_family = MaterialFamily::from_str(&family_s).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                3,
                rusqlite::types::Type::Text,
                format!("未知材料大类: {}", family_s).into(),
            )
        })?;
        let date_s: String = row.get(6)?;
        let test_date = NaiveDate::parse_from_str(&date_s, "%Y-%m-%d").map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
        })?;
        let verdict_s: String = row.get(16)?;
        let verdict = Verdict::from_str(&verdict_s).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                16,
                rusqlite::types::Type::Text,
                format!("未知判定: {}", verdict_s).into(),
            )
        })?;
        let status_s: String = row.get(17)?;
        let review_status = ReviewStatus::from_str(&status_s).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                17,
                rusqlite::types::Type::Text,
                format!("未知审核状态: {}", status_s).into(),
            )
        })?;

        Ok(FieldTestResult {
            test_id: row.get(0)?,
            test_no: row.get(1)?,
            project_id: row.get(2)?,
            material_family,
            location: row.get(4)?,
            elevation: row.get(5)?,
            test_date,
            inspector: row.get(7)?,
            gauge_number: row.get(8)?,
            spec_id: row.get(9)?,
            spec_revision: row.get(10)?,
            raw: RawReadings {
                wet_density: row.get(11)?,
                moisture_pct: row.get(12)?,
                measured_psi: row.get(13)?,
            },
            derived: DerivedResult {
                derived_value: row.get(14)?,
                percent: row.get(15)?,
            },
            verdict,
            review_status,
            record_rev: row.get(18)?,
            created_by: row.get(19)?,
            created_at: row.get(20)?,
            updated_at: row.get(21)?,
        })
    }

    pub fn insert(&self, test: &FieldTestResult) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO field_test_result (
                test_id, test_no, project_id, material_family, location, elevation,
                test_date, inspector, gauge_number,
                spec_id, spec_revision,
                wet_density, moisture_pct, measured_psi,
                derived_value, percent, verdict,
                review_status, record_rev,
                created_by, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                      ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22)
            "#,
            params![
                test.test_id,
                test.test_no,
                test.project_id,
                test.material_family.to_db_str(),
                test.location,
                test.elevation,
                test.test_date.format("%Y-%m-%d").to_string(),
                test.inspector,
                test.gauge_number,
                test.spec_id,
                test.spec_revision,
                test.raw.wet_density,
                test.raw.moisture_pct,
                test.raw.measured_psi,
                test.derived.derived_value,
                test.derived.percent,
                test.verdict.to_db_str(),
                test.review_status.to_db_str(),
                test.record_rev,
                test.created_by,
                test.created_at,
                test.updated_at,
            ],
        )?;
        Ok(())
    }

    pub fn find_by_id(&self, test_id: &str) -> RepositoryResult<Option<FieldTestResult>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM field_test_result WHERE test_id = ?1",
            Self::SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let result = stmt.query_row(params![test_id], Self::row_to_test);
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 列出项目下全部记录（按检测日期倒序, 同日按编号）
    pub fn list_by_project(&self, project_id: &str) -> RepositoryResult<Vec<FieldTestResult>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {} FROM field_test_result
            WHERE project_id = ?1
            ORDER BY test_date DESC, test_no ASC
            "#,
            Self::SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![project_id], Self::row_to_test)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    /// 按审核状态列出（审核队列）
    pub fn list_by_review_status(
        &self,
        status: ReviewStatus,
    ) -> RepositoryResult<Vec<FieldTestResult>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {} FROM field_test_result
            WHERE review_status = ?1
            ORDER BY test_date DESC, test_no ASC
            "#,
            Self::SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![status.to_db_str()], Self::row_to_test)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    /// 乐观锁更新: record_rev 不匹配时拒绝写入
    ///
    /// 成功后 record_rev +1, 返回写入后的记录。
    pub fn update_guarded(&self, test: &FieldTestResult) -> RepositoryResult<FieldTestResult> {
        let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let affected = {
            let conn = self.get_conn()?;
            conn.execute(
                r#"
                UPDATE field_test_result SET
                    location = ?1,
                    elevation = ?2,
                    test_date = ?3,
                    inspector = ?4,
                    gauge_number = ?5,
                    spec_id = ?6,
                    spec_revision = ?7,
                    wet_density = ?8,
                    moisture_pct = ?9,
                    measured_psi = ?10,
                    derived_value = ?11,
                    percent = ?12,
                    verdict = ?13,
                    review_status = ?14,
                    record_rev = record_rev + 1,
                    updated_at = ?15
                WHERE test_id = ?16 AND record_rev = ?17
                "#,
                params![
                    test.location,
                    test.elevation,
                    test.test_date.format("%Y-%m-%d").to_string(),
                    test.inspector,
                    test.gauge_number,
                    test.spec_id,
                    test.spec_revision,
                    test.raw.wet_density,
                    test.raw.moisture_pct,
                    test.raw.measured_psi,
                    test.derived.derived_value,
                    test.derived.percent,
                    test.verdict.to_db_str(),
                    test.review_status.to_db_str(),
                    now,
                    test.test_id,
                    test.record_rev,
                ],
            )?
        };

        if affected == 0 {
            return match self.find_by_id(&test.test_id)? {
                Some(_) => Err(RepositoryError::StaleRecord {
                    record_id: test.test_id.clone(),
                    expected: test.record_rev,
                }),
                None => Err(RepositoryError::NotFound {
                    entity: "FieldTestResult".to_string(),
                    id: test.test_id.clone(),
                }),
            };
        }

        let mut updated = test.clone();
        updated.record_rev += 1;
        updated.updated_at = now;
        Ok(updated)
    }

    /// 乐观锁更新审核状态
    pub fn set_review_status(
        &self,
        test_id: &str,
        status: ReviewStatus,
        expected_rev: i32,
    ) -> RepositoryResult<()> {
        let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let affected = {
            let conn = self.get_conn()?;
            conn.execute(
                r#"
                UPDATE field_test_result
                SET review_status = ?1, record_rev = record_rev + 1, updated_at = ?2
                WHERE test_id = ?3 AND record_rev = ?4
                "#,
                params![status.to_db_str(), now, test_id, expected_rev],
            )?
        };

        if affected == 0 {
            return match self.find_by_id(test_id)? {
                Some(_) => Err(RepositoryError::StaleRecord {
                    record_id: test_id.to_string(),
                    expected: expected_rev,
                }),
                None => Err(RepositoryError::NotFound {
                    entity: "FieldTestResult".to_string(),
                    id: test_id.to_string(),
                }),
            };
        }
        Ok(())
    }

    /// 规格是否被任何已保存记录引用 (引用后规格不可原地修改)
    pub fn is_spec_referenced(&self, spec_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM field_test_result WHERE spec_id = ?1",
            params![spec_id],
            |row| row.get(0),
        )?;
        Ok(n > 0)
    }

    /// 项目下一个检测编号的流水号 (如已有 24-101 / 24-102 则返回 3)
    pub fn count_by_project(&self, project_id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM field_test_result WHERE project_id = ?1",
            params![project_id],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }
}
