// ==========================================
// 工程材料检测数据系统 - 试样 API
// ==========================================
// 职责: 试样登记 / 破型录入 / 到期总览的业务入口
// 流程: 校验排程 -> 展开试块 -> 落库 (PENDING)
// 红线: 破型一经录入不可覆盖
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::ConfigManager;
use crate::domain::action_log::ActionLog;
use crate::domain::sample::{BreakItem, Sample};
use crate::domain::types::{Actor, MaterialFamily, ScheduleStatus, Verdict};
use crate::engine::sample_lifecycle::SampleLifecycle;
use crate::engine::unit_calculator::{Computation, UnitCalculator};
use crate::repository::{ActionLogRepository, SampleRepository};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

/// 新建试样请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSample {
    pub project_id: String,
    pub material_family: MaterialFamily,
    pub cast_date: NaiveDate,
    pub design_psi: f64,
    pub location: String,
    /// 不提供时使用配置的默认排程
    pub schedule: Option<Vec<BreakItem>>,
    /// 不提供时使用配置的默认试块规格
    pub cylinder_type: Option<String>,
    pub supplier: Option<String>,
    pub mix_design: Option<String>,
    pub ticket_number: Option<String>,
    pub truck_number: Option<String>,
    pub slump: Option<f64>,
    pub air_temp: Option<f64>,
    pub material_temp: Option<f64>,
}

/// 破型录入结果: 试块强度百分比 + 设计龄期处的最终判定 (如已到位)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakOutcome {
    pub cylinder_id: String,
    pub measured_psi: f64,
    /// 相对设计强度的百分比
    pub strength_percent: f64,
    /// 设计龄期破型的最终判定; 更早龄期仅供参考, 为 None
    pub final_verdict: Option<Verdict>,
}

/// 到期总览条目
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DueItem {
    pub sample_id: String,
    pub sample_no: String,
    pub project_id: String,
    pub location: String,
    pub next_due: Option<NaiveDate>,
    pub status: ScheduleStatus,
}

pub struct SampleApi {
    sample_repo: Arc<SampleRepository>,
    action_log_repo: Arc<ActionLogRepository>,
    config: Arc<ConfigManager>,
}

impl SampleApi {
    pub fn new(
        sample_repo: Arc<SampleRepository>,
        action_log_repo: Arc<ActionLogRepository>,
        config: Arc<ConfigManager>,
    ) -> Self {
        Self {
            sample_repo,
            action_log_repo,
            config,
        }
    }

    /// 登记试样并展开破型排程
    pub fn create_sample(&self, req: NewSample, actor: &Actor) -> ApiResult<Sample> {
        if !req.material_family.is_lab_cured() {
            return Err(ApiError::InvalidInput(format!(
                "材料大类 {} 不适用试样登记 (仅混凝土/灌浆料)",
                req.material_family
            )));
        }
        if req.project_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("项目编号不能为空".to_string()));
        }
        if !req.design_psi.is_finite() || req.design_psi <= 0.0 {
            return Err(ApiError::InvalidInput(format!(
                "设计强度无效: {}",
                req.design_psi
            )));
        }

        let schedule = match req.schedule {
            Some(s) => s,
            None => self
                .config
                .get_default_break_schedule(req.material_family)
                .map_err(|e| ApiError::InternalError(e.to_string()))?,
        };
        let cylinder_type = match req.cylinder_type {
            Some(t) => t,
            None => self
                .config
                .get_default_cylinder_type(req.material_family)
                .map_err(|e| ApiError::InternalError(e.to_string()))?,
        };

        // 流水编号, 如 S-24-1001
        let seq = self.sample_repo.count_all()? + 1001;
        let sample_no = format!("S-{:02}-{}", req.cast_date.year() % 100, seq);

        let mut sample = Sample::new(
            sample_no,
            req.project_id,
            req.material_family,
            req.cast_date,
            req.design_psi,
            req.location,
            actor.actor_id.clone(),
        );
        sample.supplier = req.supplier;
        sample.mix_design = req.mix_design;
        sample.ticket_number = req.ticket_number;
        sample.truck_number = req.truck_number;
        sample.slump = req.slump;
        sample.air_temp = req.air_temp;
        sample.material_temp = req.material_temp;
        sample.cylinders = SampleLifecycle::expand_schedule(
            &sample.sample_id,
            sample.cast_date,
            &schedule,
            &cylinder_type,
        )?;

        self.sample_repo.insert(&sample)?;

        info!(
            sample_no = %sample.sample_no,
            cylinders = sample.cylinders.len(),
            "试样已登记"
        );

        let log = ActionLog::new("CREATE_SAMPLE", &actor.actor_id)
            .with_record(&sample.sample_id)
            .with_payload(json!({
                "sample_no": sample.sample_no,
                "design_psi": sample.design_psi,
                "cylinders": sample.cylinders.len(),
            }));
        if let Err(e) = self.action_log_repo.insert(&log) {
            warn!(error = %e, "操作日志写入失败");
        }

        Ok(sample)
    }

    /// 破型录入
    ///
    /// 设计龄期 (排程中最大龄期) 的破型产生最终判定;
    /// 更早龄期的破型仅记录参考强度百分比。
    pub fn record_break(
        &self,
        sample_id: &str,
        cylinder_id: &str,
        measured_psi: f64,
        actor: &Actor,
    ) -> ApiResult<BreakOutcome> {
        let mut sample = self
            .sample_repo
            .find_by_id(sample_id)?
            .ok_or_else(|| ApiError::NotFound(format!("试样不存在: {}", sample_id)))?;

        // 引擎校验 (归属 / 不可覆盖 / 数值有效)
        SampleLifecycle::record_break(&mut sample, cylinder_id, measured_psi)?;
        // 数据库层守卫再兜底一次 (并发下保证不可覆盖)
        self.sample_repo.record_break(cylinder_id, measured_psi)?;

        let strength_percent =
            match UnitCalculator::strength_percent(measured_psi, sample.design_psi) {
                Computation::Computed(d) => d.percent,
                Computation::NotComputable { reason } => {
                    return Err(ApiError::NotComputable(reason));
                }
            };

        let broken = sample
            .cylinders
            .iter()
            .find(|c| c.cylinder_id == cylinder_id)
            .ok_or_else(|| ApiError::InternalError("破型试块丢失".to_string()))?;
        let is_design_age = Some(broken.age_days) == sample.design_age_days();
        let final_verdict = if is_design_age {
            Some(if strength_percent >= 100.0 {
                Verdict::Pass
            } else {
                Verdict::Fail
            })
        } else {
            None
        };

        info!(
            sample_no = %sample.sample_no,
            cylinder_id = %cylinder_id,
            measured_psi = measured_psi,
            strength_percent = strength_percent,
            design_age = is_design_age,
            "破型已录入"
        );

        let log = ActionLog::new("RECORD_BREAK", &actor.actor_id)
            .with_record(sample_id)
            .with_payload(json!({
                "cylinder_id": cylinder_id,
                "measured_psi": measured_psi,
                "strength_percent": strength_percent,
                "final_verdict": final_verdict,
            }));
        if let Err(e) = self.action_log_repo.insert(&log) {
            warn!(error = %e, "操作日志写入失败");
        }

        Ok(BreakOutcome {
            cylinder_id: cylinder_id.to_string(),
            measured_psi,
            strength_percent,
            final_verdict,
        })
    }

    /// 到期总览: 尚有未破型试块的试样, 逾期在前
    pub fn due_overview(&self, today: NaiveDate) -> ApiResult<Vec<DueItem>> {
        let open = self.sample_repo.list_open()?;
        let mut items: Vec<DueItem> = open
            .iter()
            .map(|s| DueItem {
                sample_id: s.sample_id.clone(),
                sample_no: s.sample_no.clone(),
                project_id: s.project_id.clone(),
                location: s.location.clone(),
                next_due: SampleLifecycle::next_due(s),
                status: SampleLifecycle::schedule_status(s, today),
            })
            .collect();
        items.sort_by_key(|item| item.next_due);
        Ok(items)
    }

    pub fn get(&self, sample_id: &str) -> ApiResult<Sample> {
        self.sample_repo
            .find_by_id(sample_id)?
            .ok_or_else(|| ApiError::NotFound(format!("试样不存在: {}", sample_id)))
    }

    pub fn list_by_project(&self, project_id: &str) -> ApiResult<Vec<Sample>> {
        Ok(self.sample_repo.list_by_project(project_id)?)
    }
}
