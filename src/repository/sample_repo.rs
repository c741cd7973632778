// ==========================================
// 工程材料检测数据系统 - 试样仓储
// ==========================================
// 职责: 管理 sample / cylinder 两张表 (一对多, 级联删除仅限外键定义)
// 并发: 试样级乐观锁; 试块破型用 "measured_psi IS NULL" 守卫保证不可覆盖
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::sample::{Cylinder, Sample};
use crate::domain::types::{MaterialFamily, ReviewStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

pub struct SampleRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SampleRepository {
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
            CREATE TABLE IF NOT EXISTS sample (
              sample_id TEXT PRIMARY KEY,
              sample_no TEXT NOT NULL UNIQUE,
              project_id TEXT NOT NULL,
              material_family TEXT NOT NULL,
              cast_date TEXT NOT NULL,
              design_psi REAL NOT NULL,
              location TEXT NOT NULL,
              supplier TEXT,
              mix_design TEXT,
              ticket_number TEXT,
              truck_number TEXT,
              slump REAL,
              air_temp REAL,
              material_temp REAL,
              review_status TEXT NOT NULL DEFAULT 'PENDING',
              record_rev INTEGER NOT NULL DEFAULT 1,
              created_by TEXT NOT NULL,
              created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS cylinder (
              cylinder_id TEXT PRIMARY KEY,
              sample_id TEXT NOT NULL,
              seq INTEGER NOT NULL,
              age_days INTEGER NOT NULL,
              scheduled_date TEXT NOT NULL,
              measured_psi REAL,
              cylinder_type TEXT NOT NULL,
              FOREIGN KEY (sample_id) REFERENCES sample(sample_id) ON DELETE CASCADE,
              UNIQUE(sample_id, seq)
            );

            CREATE INDEX IF NOT EXISTS idx_sample_project
              ON sample(project_id, cast_date DESC);
            CREATE INDEX IF NOT EXISTS idx_cylinder_sample
              ON cylinder(sample_id);
            CREATE INDEX IF NOT EXISTS idx_cylinder_due
              ON cylinder(scheduled_date) WHERE measured_psi IS NULL;
            "#,
        )?;
        Ok(())
    }

    fn row_to_sample(row: &Row) -> SqliteResult<Sample> {
        let family_s: String = row.get(3)?;
        let material_family = MaterialFamily::from_str(&family_s).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                3,
                rusqlite::types::Type::Text,
                format!("未知材料大类: {}", family_s).into(),
            )
        })?;
        let date_s: String = row.get(4)?;
        let cast_date = NaiveDate::parse_from_str(&date_s, "%Y-%m-%d").map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?;
        let status_s: String = row.get(14)?;
        let review_status = ReviewStatus::from_str(&status_s).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                14,
                rusqlite::types::Type::Text,
                format!("未知审核状态: {}", status_s).into(),
            )
        })?;

        Ok(Sample {
            sample_id: row.get(0)?,
            sample_no: row.get(1)?,
            project_id: row.get(2)?,
            material_family,
            cast_date,
            design_psi: row.get(5)?,
            location: row.get(6)?,
            supplier: row.get(7)?,
            mix_design: row.get(8)?,
            ticket_number: row.get(9)?,
            truck_number: row.get(10)?,
            slump: row.get(11)?,
            air_temp: row.get(12)?,
            material_temp: row.get(13)?,
            cylinders: Vec::new(),
            review_status,
            record_rev: row.get(15)?,
            created_by: row.get(16)?,
            created_at: row.get(17)?,
        })
    }

    fn row_to_cylinder(row: &Row) -> SqliteResult<Cylinder> {
        let date_s: String = row.get(4)?;
        let scheduled_date = NaiveDate::parse_from_str(&date_s, "%Y-%m-%d").map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?;
        Ok(Cylinder {
            cylinder_id: row.get(0)?,
            sample_id: row.get(1)?,
            seq: row.get::<_, i64>(2)? as u32,
            age_days: row.get(3)?,
            scheduled_date,
            measured_psi: row.get(5)?,
            cylinder_type: row.get(6)?,
        })
    }

    const SAMPLE_COLUMNS: &'static str = r#"
        sample_id, sample_no, project_id, material_family, cast_date,
        design_psi, location,
        supplier, mix_design, ticket_number, truck_number,
        slump, air_temp, material_temp,
        review_status, record_rev, created_by, created_at
    "#;

    const CYLINDER_COLUMNS: &'static str = r#"
        cylinder_id, sample_id, seq, age_days, scheduled_date, measured_psi, cylinder_type
    "#;

    /// 插入试样及其全部试块 (事务)
    pub fn insert(&self, sample: &Sample) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            r#"
            INSERT INTO sample (
                sample_id, sample_no, project_id, material_family, cast_date,
                design_psi, location,
                supplier, mix_design, ticket_number, truck_number,
                slump, air_temp, material_temp,
                review_status, record_rev, created_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                      ?15, ?16, ?17, ?18)
            "#,
            params![
                sample.sample_id,
                sample.sample_no,
                sample.project_id,
                sample.material_family.to_db_str(),
                sample.cast_date.format("%Y-%m-%d").to_string(),
                sample.design_psi,
                sample.location,
                sample.supplier,
                sample.mix_design,
                sample.ticket_number,
                sample.truck_number,
                sample.slump,
                sample.air_temp,
                sample.material_temp,
                sample.review_status.to_db_str(),
                sample.record_rev,
                sample.created_by,
                sample.created_at,
            ],
        )?;
        for c in &sample.cylinders {
            tx.execute(
                r#"
                INSERT INTO cylinder (
                    cylinder_id, sample_id, seq, age_days, scheduled_date,
                    measured_psi, cylinder_type
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    c.cylinder_id,
                    c.sample_id,
                    c.seq as i64,
                    c.age_days,
                    c.scheduled_date.format("%Y-%m-%d").to_string(),
                    c.measured_psi,
                    c.cylinder_type,
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn load_cylinders(
        conn: &Connection,
        sample_id: &str,
    ) -> RepositoryResult<Vec<Cylinder>> {
        let sql = format!(
            "SELECT {} FROM cylinder WHERE sample_id = ?1 ORDER BY seq ASC",
            Self::CYLINDER_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![sample_id], Self::row_to_cylinder)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn find_by_id(&self, sample_id: &str) -> RepositoryResult<Option<Sample>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM sample WHERE sample_id = ?1",
            Self::SAMPLE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let result = stmt.query_row(params![sample_id], Self::row_to_sample);
        match result {
            Ok(mut sample) => {
                sample.cylinders = Self::load_cylinders(&conn, sample_id)?;
                Ok(Some(sample))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 列出项目下全部试样 (带试块, 按浇筑日期倒序)
    pub fn list_by_project(&self, project_id: &str) -> RepositoryResult<Vec<Sample>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {} FROM sample
            WHERE project_id = ?1
            ORDER BY cast_date DESC, sample_no ASC
            "#,
            Self::SAMPLE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut samples = stmt
            .query_map(params![project_id], Self::row_to_sample)?
            .collect::<SqliteResult<Vec<_>>>()?;
        drop(stmt);
        for sample in samples.iter_mut() {
            sample.cylinders = Self::load_cylinders(&conn, &sample.sample_id)?;
        }
        Ok(samples)
    }

    /// 列出尚有未破型试块的试样 (实验室工作队列)
    pub fn list_open(&self) -> RepositoryResult<Vec<Sample>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {} FROM sample
            WHERE sample_id IN (SELECT DISTINCT sample_id FROM cylinder WHERE measured_psi IS NULL)
            ORDER BY cast_date ASC, sample_no ASC
            "#,
            Self::SAMPLE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut samples = stmt
            .query_map([], Self::row_to_sample)?
            .collect::<SqliteResult<Vec<_>>>()?;
        drop(stmt);
        for sample in samples.iter_mut() {
            sample.cylinders = Self::load_cylinders(&conn, &sample.sample_id)?;
        }
        Ok(samples)
    }

    /// 破型落库: 仅当试块尚无实测强度时写入
    ///
    /// 数据库层守卫与引擎校验互为兜底, 并发下保证不可覆盖。
    pub fn record_break(&self, cylinder_id: &str, measured_psi: f64) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            r#"
            UPDATE cylinder SET measured_psi = ?1
            WHERE cylinder_id = ?2 AND measured_psi IS NULL
            "#,
            params![measured_psi, cylinder_id],
        )?;
        if affected == 0 {
            let exists: bool = conn
                .query_row(
                    "SELECT 1 FROM cylinder WHERE cylinder_id = ?1",
                    params![cylinder_id],
                    |_row| Ok(true),
                )
                .unwrap_or(false);
            return if exists {
                Err(RepositoryError::BusinessRuleViolation(format!(
                    "试块已有实测强度: cylinder_id={}",
                    cylinder_id
                )))
            } else {
                Err(RepositoryError::NotFound {
                    entity: "Cylinder".to_string(),
                    id: cylinder_id.to_string(),
                })
            };
        }
        Ok(())
    }

    /// 乐观锁更新送料单信息与浇筑部位
    pub fn update_guarded(&self, sample: &Sample) -> RepositoryResult<Sample> {
        let affected = {
            let conn = self.get_conn()?;
            conn.execute(
                r#"
                UPDATE sample SET
                    location = ?1,
                    design_psi = ?2,
                    supplier = ?3,
                    mix_design = ?4,
                    ticket_number = ?5,
                    truck_number = ?6,
                    slump = ?7,
                    air_temp = ?8,
                    material_temp = ?9,
                    review_status = ?10,
                    record_rev = record_rev + 1
                WHERE sample_id = ?11 AND record_rev = ?12
                "#,
                params![
                    sample.location,
                    sample.design_psi,
                    sample.supplier,
                    sample.mix_design,
                    sample.ticket_number,
                    sample.truck_number,
                    sample.slump,
                    sample.air_temp,
                    sample.material_temp,
                    sample.review_status.to_db_str(),
                    sample.sample_id,
                    sample.record_rev,
                ],
            )?
        };

        if affected == 0 {
            return match self.find_by_id(&sample.sample_id)? {
                Some(_) => Err(RepositoryError::StaleRecord {
                    record_id: sample.sample_id.clone(),
                    expected: sample.record_rev,
                }),
                None => Err(RepositoryError::NotFound {
                    entity: "Sample".to_string(),
                    id: sample.sample_id.clone(),
                }),
            };
        }

        let mut updated = sample.clone();
        updated.record_rev += 1;
        Ok(updated)
    }

    /// 乐观锁更新审核状态
    pub fn set_review_status(
        &self,
        sample_id: &str,
        status: ReviewStatus,
        expected_rev: i32,
    ) -> RepositoryResult<()> {
        let affected = {
            let conn = self.get_conn()?;
            conn.execute(
                r#"
                UPDATE sample
                SET review_status = ?1, record_rev = record_rev + 1
                WHERE sample_id = ?2 AND record_rev = ?3
                "#,
                params![status.to_db_str(), sample_id, expected_rev],
            )?
        };
        if affected == 0 {
            return match self.find_by_id(sample_id)? {
                Some(_) => Err(RepositoryError::StaleRecord {
                    record_id: sample_id.to_string(),
                    expected: expected_rev,
                }),
                None => Err(RepositoryError::NotFound {
                    entity: "Sample".to_string(),
                    id: sample_id.to_string(),
                }),
            };
        }
        Ok(())
    }

    pub fn count_all(&self) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM sample", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}
