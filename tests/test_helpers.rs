// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的数据库初始化、测试数据生成等功能
// ==========================================

use cmt_fieldops::api::SpecFields;
use cmt_fieldops::app::AppState;
use cmt_fieldops::domain::types::{Actor, MaterialFamily, Role};
use tempfile::NamedTempFile;

/// 创建临时数据库上的完整应用状态
///
/// 各仓储通过 ensure_table 幂等建表, 无需额外 schema 脚本。
/// NamedTempFile 需要保持存活, 由调用方持有。
pub fn setup_app() -> (NamedTempFile, AppState) {
    let temp_file = NamedTempFile::new().expect("创建临时数据库失败");
    let db_path = temp_file.path().to_str().unwrap().to_string();
    let state = AppState::new(db_path).expect("初始化AppState失败");
    (temp_file, state)
}

/// 现场检测员 (无审核权限)
pub fn employee() -> Actor {
    Actor {
        actor_id: "e-100".to_string(),
        display_name: "Alex Field".to_string(),
        role: Role::Employee,
    }
}

/// 项目经理 (审核权限)
pub fn manager() -> Actor {
    Actor {
        actor_id: "m-001".to_string(),
        display_name: "Pat Reviewer".to_string(),
        role: Role::Manager,
    }
}

/// 土方规格字段: Proctor 118.5 pcf / 最优含水率 9.0% / 最低压实度 95%
pub fn soil_spec_fields() -> SpecFields {
    SpecFields {
        max_dry_density: Some(118.5),
        optimum_moisture: Some(9.0),
        target_density: None,
        min_compaction: Some(95.0),
        max_compaction: None,
        min_moisture_delta: Some(-2.0),
        max_moisture_delta: Some(2.0),
        min_psi: None,
    }
}

/// 沥青规格字段: 目标密度 148.5 pcf / 压实度带 92%..97%
pub fn asphalt_spec_fields() -> SpecFields {
    SpecFields {
        max_dry_density: None,
        optimum_moisture: None,
        target_density: Some(148.5),
        min_compaction: Some(92.0),
        max_compaction: Some(97.0),
        min_moisture_delta: None,
        max_moisture_delta: None,
        min_psi: None,
    }
}

/// 在应用状态下建立一条土方规格, 返回部位名称
pub fn seed_soil_spec(state: &AppState, project_id: &str, location: &str) {
    state
        .spec_api
        .create_spec(
            project_id,
            MaterialFamily::Soil,
            location,
            soil_spec_fields(),
            &manager(),
        )
        .expect("建立土方规格失败");
}
