// ==========================================
// 工程材料检测数据系统 - 规格管理 API
// ==========================================
// 职责: 项目验收标准 (检测规格) 的维护入口
// 红线: 被已保存记录引用的规格不可原地修改, 一律产生新修订
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::action_log::ActionLog;
use crate::domain::specification::Specification;
use crate::domain::types::{Actor, MaterialFamily};
use crate::repository::{ActionLogRepository, FieldTestRepository, SpecRepository};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

/// 规格字段集 (新建与修订共用)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecFields {
    pub max_dry_density: Option<f64>,
    pub optimum_moisture: Option<f64>,
    pub target_density: Option<f64>,
    pub min_compaction: Option<f64>,
    pub max_compaction: Option<f64>,
    pub min_moisture_delta: Option<f64>,
    pub max_moisture_delta: Option<f64>,
    pub min_psi: Option<f64>,
}

impl SpecFields {
    fn apply(&self, spec: &mut Specification) {
        spec.max_dry_density = self.max_dry_density;
        spec.optimum_moisture = self.optimum_moisture;
        spec.target_density = self.target_density;
        spec.min_compaction = self.min_compaction;
        spec.max_compaction = self.max_compaction;
        spec.min_moisture_delta = self.min_moisture_delta;
        spec.max_moisture_delta = self.max_moisture_delta;
        spec.min_psi = self.min_psi;
    }
}

pub struct SpecApi {
    spec_repo: Arc<SpecRepository>,
    field_test_repo: Arc<FieldTestRepository>,
    action_log_repo: Arc<ActionLogRepository>,
}

impl SpecApi {
    pub fn new(
        spec_repo: Arc<SpecRepository>,
        field_test_repo: Arc<FieldTestRepository>,
        action_log_repo: Arc<ActionLogRepository>,
    ) -> Self {
        Self {
            spec_repo,
            field_test_repo,
            action_log_repo,
        }
    }

    fn authorize(actor: &Actor) -> ApiResult<()> {
        if actor.can_review() {
            Ok(())
        } else {
            Err(ApiError::Forbidden(format!(
                "{} ({})",
                actor.display_name, actor.role
            )))
        }
    }

    /// 新建规格 (部位级, 修订号 1)
    pub fn create_spec(
        &self,
        project_id: &str,
        material_family: MaterialFamily,
        location_name: &str,
        fields: SpecFields,
        actor: &Actor,
    ) -> ApiResult<Specification> {
        Self::authorize(actor)?;
        if project_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("项目编号不能为空".to_string()));
        }
        if location_name.trim().is_empty() {
            return Err(ApiError::InvalidInput("部位名称不能为空".to_string()));
        }
        if self
            .spec_repo
            .find_active(project_id, material_family, location_name)?
            .is_some()
        {
            return Err(ApiError::BusinessRuleViolation(format!(
                "部位已存在规格, 修改请走修订: {}",
                location_name
            )));
        }

        let mut spec = Specification::new(
            project_id.to_string(),
            material_family,
            location_name.to_string(),
            actor.actor_id.clone(),
        );
        fields.apply(&mut spec);

        self.spec_repo.insert(&spec)?;

        let log = ActionLog::new("CREATE_SPEC", &actor.actor_id)
            .with_record(&spec.spec_id)
            .with_payload(json!({
                "project_id": project_id,
                "material_family": material_family,
                "location_name": location_name,
            }));
        if let Err(e) = self.action_log_repo.insert(&log) {
            warn!(error = %e, "操作日志写入失败");
        }

        Ok(spec)
    }

    /// 修改规格: 产生新修订, 旧修订保留供历史记录复算
    pub fn update_spec(
        &self,
        spec_id: &str,
        fields: SpecFields,
        actor: &Actor,
    ) -> ApiResult<Specification> {
        Self::authorize(actor)?;
        let existing = self
            .spec_repo
            .find_by_id(spec_id)?
            .ok_or_else(|| ApiError::NotFound(format!("规格不存在: {}", spec_id)))?;
        if !existing.active {
            return Err(ApiError::BusinessRuleViolation(format!(
                "只能基于 active 修订修改: spec_id={}, revision={}",
                spec_id, existing.revision
            )));
        }

        let referenced = self.field_test_repo.is_spec_referenced(spec_id)?;

        let mut new_spec = Specification::new(
            existing.project_id.clone(),
            existing.material_family,
            existing.location_name.clone(),
            actor.actor_id.clone(),
        );
        fields.apply(&mut new_spec);

        let revised = self.spec_repo.revise(spec_id, &new_spec)?;

        let log = ActionLog::new("REVISE_SPEC", &actor.actor_id)
            .with_record(&revised.spec_id)
            .with_payload(json!({
                "previous_spec_id": spec_id,
                "revision": revised.revision,
                "was_referenced": referenced,
            }));
        if let Err(e) = self.action_log_repo.insert(&log) {
            warn!(error = %e, "操作日志写入失败");
        }

        Ok(revised)
    }

    pub fn get_active(
        &self,
        project_id: &str,
        material_family: MaterialFamily,
        location_name: &str,
    ) -> ApiResult<Specification> {
        self.spec_repo
            .find_active(project_id, material_family, location_name)?
            .ok_or_else(|| {
                ApiError::SpecNotFound(format!(
                    "project={}, family={}, location={}",
                    project_id, material_family, location_name
                ))
            })
    }

    pub fn list_locations(
        &self,
        project_id: &str,
        material_family: MaterialFamily,
    ) -> ApiResult<Vec<Specification>> {
        Ok(self.spec_repo.list_active(project_id, material_family)?)
    }
}
