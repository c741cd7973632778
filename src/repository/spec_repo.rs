// ==========================================
// 工程材料检测数据系统 - 检测规格仓储
// ==========================================
// 职责: 管理 specification 表 (按项目+材料大类+部位, 带修订历史)
// 约束: 同一部位仅一条 active 修订; 单项目单大类最多 50 个部位
// 红线: 被引用的修订不做原地更新, 只能经 revise 产生新修订
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::specification::{Specification, MAX_LOCATIONS_PER_PROJECT_FAMILY};
use crate::domain::types::MaterialFamily;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

pub struct SpecRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SpecRepository {
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
            CREATE TABLE IF NOT EXISTS specification (
              spec_id TEXT PRIMARY KEY,
              project_id TEXT NOT NULL,
              material_family TEXT NOT NULL,
              location_name TEXT NOT NULL,
              revision INTEGER NOT NULL DEFAULT 1,
              active INTEGER NOT NULL DEFAULT 1,
              max_dry_density REAL,
              optimum_moisture REAL,
              target_density REAL,
              min_compaction REAL,
              max_compaction REAL,
              min_moisture_delta REAL,
              max_moisture_delta REAL,
              min_psi REAL,
              created_at TEXT NOT NULL DEFAULT (datetime('now')),
              created_by TEXT NOT NULL,
              UNIQUE(project_id, material_family, location_name, revision)
            );

            CREATE INDEX IF NOT EXISTS idx_spec_lookup
              ON specification(project_id, material_family, location_name, active);
            CREATE INDEX IF NOT EXISTS idx_spec_project
              ON specification(project_id);
            "#,
        )?;
        Ok(())
    }

    fn row_to_spec(row: &Row) -> SqliteResult<Specification> {
        let family_s: String = row.get(2)?;
        let material_family = MaterialFamily::from_str(&family_s).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                format!("未知材料大类: {}", family_s).into(),
            )
        })?;
        Ok(Specification {
            spec_id: row.get(0)?,
            project_id: row.get(1)?,
            material_family,
            location_name: row.get(3)?,
            revision: row.get(4)?,
            active: row.get::<_, i64>(5)? != 0,
            max_dry_density: row.get(6)?,
            optimum_moisture: row.get(7)?,
            target_density: row.get(8)?,
            min_compaction: row.get(9)?,
            max_compaction: row.get(10)?,
            min_moisture_delta: row.get(11)?,
            max_moisture_delta: row.get(12)?,
            min_psi: row.get(13)?,
            created_at: row.get(14)?,
            created_by: row.get(15)?,
        })
    }

    const SELECT_COLUMNS: &'static str = r#"
        spec_id, project_id, material_family, location_name,
        revision, active,
        max_dry_density, optimum_moisture, target_density,
        min_compaction, max_compaction,
        min_moisture_delta, max_moisture_delta, min_psi,
        created_at, created_by
    "#;

    /// 新增规格 (新部位, 修订号 1)
    ///
    /// 超过单项目单大类部位上限时拒绝。
    pub fn insert(&self, spec: &Specification) -> RepositoryResult<()> {
        let existing = self.count_locations(&spec.project_id, spec.material_family)?;
        let is_new_location = self
            .find_active(&spec.project_id, spec.material_family, &spec.location_name)?
            .is_none();
        if is_new_location && existing >= MAX_LOCATIONS_PER_PROJECT_FAMILY {
            return Err(RepositoryError::BusinessRuleViolation(format!(
                "项目 {} 材料大类 {} 的部位数已达上限 {}",
                spec.project_id, spec.material_family, MAX_LOCATIONS_PER_PROJECT_FAMILY
            )));
        }

        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO specification (
                spec_id, project_id, material_family, location_name,
                revision, active,
                max_dry_density, optimum_moisture, target_density,
                min_compaction, max_compaction,
                min_moisture_delta, max_moisture_delta, min_psi,
                created_at, created_by
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
            "#,
            params![
                spec.spec_id,
                spec.project_id,
                spec.material_family.to_db_str(),
                spec.location_name,
                spec.revision,
                spec.active as i64,
                spec.max_dry_density,
                spec.optimum_moisture,
                spec.target_density,
                spec.min_compaction,
                spec.max_compaction,
                spec.min_moisture_delta,
                spec.max_moisture_delta,
                spec.min_psi,
                spec.created_at,
                spec.created_by,
            ],
        )?;
        Ok(())
    }

    /// 按 spec_id 查找 (任意修订)
    pub fn find_by_id(&self, spec_id: &str) -> RepositoryResult<Option<Specification>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM specification WHERE spec_id = ?1",
            Self::SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let result = stmt.query_row(params![spec_id], Self::row_to_spec);
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 按 (项目, 材料大类, 部位) 查找 active 修订
    pub fn find_active(
        &self,
        project_id: &str,
        material_family: MaterialFamily,
        location_name: &str,
    ) -> RepositoryResult<Option<Specification>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {} FROM specification
            WHERE project_id = ?1 AND material_family = ?2 AND location_name = ?3 AND active = 1
            ORDER BY revision DESC
            LIMIT 1
            "#,
            Self::SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let result = stmt.query_row(
            params![project_id, material_family.to_db_str(), location_name],
            Self::row_to_spec,
        );
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 列出项目下某材料大类的全部 active 规格（按部位名排序）
    pub fn list_active(
        &self,
        project_id: &str,
        material_family: MaterialFamily,
    ) -> RepositoryResult<Vec<Specification>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {} FROM specification
            WHERE project_id = ?1 AND material_family = ?2 AND active = 1
            ORDER BY location_name ASC
            "#,
            Self::SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![project_id, material_family.to_db_str()], Self::row_to_spec)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    /// 列出某部位的修订历史（按修订号倒序）
    pub fn list_revisions(
        &self,
        project_id: &str,
        material_family: MaterialFamily,
        location_name: &str,
    ) -> RepositoryResult<Vec<Specification>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {} FROM specification
            WHERE project_id = ?1 AND material_family = ?2 AND location_name = ?3
            ORDER BY revision DESC
            "#,
            Self::SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(
                params![project_id, material_family.to_db_str(), location_name],
                Self::row_to_spec,
            )?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    /// 项目下某材料大类的不同部位数
    pub fn count_locations(
        &self,
        project_id: &str,
        material_family: MaterialFamily,
    ) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let n: i64 = conn.query_row(
            r#"
            SELECT COUNT(DISTINCT location_name) FROM specification
            WHERE project_id = ?1 AND material_family = ?2
            "#,
            params![project_id, material_family.to_db_str()],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }

    /// 产生新修订: 旧修订置为 inactive, 新修订以 revision+1 插入
    ///
    /// 事务内完成, 保证同一部位始终恰有一条 active 修订。
    pub fn revise(
        &self,
        old_spec_id: &str,
        new_spec: &Specification,
    ) -> RepositoryResult<Specification> {
        let old = self
            .find_by_id(old_spec_id)?
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "Specification".to_string(),
                id: old_spec_id.to_string(),
            })?;

        let mut revised = new_spec.clone();
        revised.project_id = old.project_id.clone();
        revised.material_family = old.material_family;
        revised.location_name = old.location_name.clone();
        revised.revision = old.revision + 1;
        revised.active = true;

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "UPDATE specification SET active = 0 WHERE spec_id = ?1",
            params![old_spec_id],
        )?;
        tx.execute(
            r#"
            INSERT INTO specification (
                spec_id, project_id, material_family, location_name,
                revision, active,
                max_dry_density, optimum_moisture, target_density,
                min_compaction, max_compaction,
                min_moisture_delta, max_moisture_delta, min_psi,
                created_at, created_by
            ) VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
            params![
                revised.spec_id,
                revised.project_id,
                revised.material_family.to_db_str(),
                revised.location_name,
                revised.revision,
                revised.max_dry_density,
                revised.optimum_moisture,
                revised.target_density,
                revised.min_compaction,
                revised.max_compaction,
                revised.min_moisture_delta,
                revised.max_moisture_delta,
                revised.min_psi,
                revised.created_at,
                revised.created_by,
            ],
        )?;
        tx.commit()?;
        Ok(revised)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn soil_spec(location: &str) -> Specification {
        let mut spec = Specification::new(
            "J-24-101".to_string(),
            MaterialFamily::Soil,
            location.to_string(),
            "admin".to_string(),
        );
        spec.max_dry_density = Some(115.5);
        spec.optimum_moisture = Some(9.0);
        spec.min_compaction = Some(95.0);
        spec
    }

    #[test]
    fn test_insert_and_find_active() {
        let repo = SpecRepository::new(":memory:").expect("create repo");
        let spec = soil_spec("Building Pad");
        repo.insert(&spec).expect("insert");

        let found = repo
            .find_active("J-24-101", MaterialFamily::Soil, "Building Pad")
            .expect("find")
            .expect("spec exists");
        assert_eq!(found.spec_id, spec.spec_id);
        assert_eq!(found.max_dry_density, Some(115.5));
        assert_eq!(found.revision, 1);
        assert!(found.active);
    }

    #[test]
    fn test_find_active_is_exact_match() {
        let repo = SpecRepository::new(":memory:").expect("create repo");
        repo.insert(&soil_spec("Building Pad")).expect("insert");

        assert!(repo
            .find_active("J-24-101", MaterialFamily::Soil, "Building pad")
            .expect("find")
            .is_none());
        assert!(repo
            .find_active("J-24-101", MaterialFamily::Asphalt, "Building Pad")
            .expect("find")
            .is_none());
    }

    #[test]
    fn test_revise_keeps_single_active_revision() {
        let repo = SpecRepository::new(":memory:").expect("create repo");
        let original = soil_spec("Building Pad");
        repo.insert(&original).expect("insert");

        let mut updated = soil_spec("Building Pad");
        updated.min_compaction = Some(98.0);
        let revised = repo.revise(&original.spec_id, &updated).expect("revise");
        assert_eq!(revised.revision, 2);

        // 旧修订失效, 新修订生效
        let active = repo
            .find_active("J-24-101", MaterialFamily::Soil, "Building Pad")
            .expect("find")
            .expect("active exists");
        assert_eq!(active.revision, 2);
        assert_eq!(active.min_compaction, Some(98.0));

        // 旧修订仍可按 id 追溯 (判定可复算)
        let old = repo
            .find_by_id(&original.spec_id)
            .expect("find")
            .expect("old exists");
        assert!(!old.active);
        assert_eq!(old.min_compaction, Some(95.0));

        let history = repo
            .list_revisions("J-24-101", MaterialFamily::Soil, "Building Pad")
            .expect("history");
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_location_cap_enforced() {
        let repo = SpecRepository::new(":memory:").expect("create repo");
        for i in 0..MAX_LOCATIONS_PER_PROJECT_FAMILY {
            repo.insert(&soil_spec(&format!("Location {}", i)))
                .expect("insert within cap");
        }
        let err = repo.insert(&soil_spec("One Too Many")).unwrap_err();
        assert!(matches!(err, RepositoryError::BusinessRuleViolation(_)));

        // 上限按 (项目, 材料大类) 计, 其他大类不受影响
        let mut asphalt = soil_spec("Access Road");
        asphalt.material_family = MaterialFamily::Asphalt;
        repo.insert(&asphalt).expect("other family unaffected");
    }

    #[test]
    fn test_count_locations() {
        let repo = SpecRepository::new(":memory:").expect("create repo");
        repo.insert(&soil_spec("A")).expect("insert");
        repo.insert(&soil_spec("B")).expect("insert");
        assert_eq!(
            repo.count_locations("J-24-101", MaterialFamily::Soil)
                .expect("count"),
            2
        );
        assert_eq!(
            repo.count_locations("J-24-101", MaterialFamily::Asphalt)
                .expect("count"),
            0
        );
    }
}
