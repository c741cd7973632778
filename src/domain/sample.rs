// ==========================================
// 工程材料检测数据系统 - 试样与试块实体
// ==========================================
// 职责: 浇筑批次试样 = 设计强度 + 浇筑日期 + 龄期破型排程
// 约束: 排程 count 合计 = 试块总数; 计划破型日 = 浇筑日 + 龄期天数
// ==========================================

use crate::domain::types::{MaterialFamily, ReviewStatus, SampleStatus};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 破型排程条目: 某一龄期需要破型的试块数量
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakItem {
    /// 龄期 (天)
    pub age_days: i64,
    /// 该龄期试块数量
    pub count: u32,
}

/// 单个试块 (圆柱体/立方体)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cylinder {
    pub cylinder_id: String,
    pub sample_id: String,
    /// 试样内序号, 从 1 递增 (C1, C2, ...)
    pub seq: u32,
    pub age_days: i64,
    /// 计划破型日 = cast_date + age_days
    pub scheduled_date: NaiveDate,
    /// 实测强度 (psi); 一经录入即不可变
    pub measured_psi: Option<f64>,
    /// 尺寸规格, 如 4x8 / 6x12
    pub cylinder_type: String,
}

/// 试样 (混凝土/灌浆料批次)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sample {
    pub sample_id: String,
    /// 人读编号, 如 S-24-1010
    pub sample_no: String,
    pub project_id: String,
    pub material_family: MaterialFamily,
    pub cast_date: NaiveDate,
    /// 设计强度 (psi)
    pub design_psi: f64,
    /// 浇筑部位
    pub location: String,

    // ===== 送料单信息 (仅存储) =====
    pub supplier: Option<String>,
    pub mix_design: Option<String>,
    pub ticket_number: Option<String>,
    pub truck_number: Option<String>,
    /// 坍落度 (in)
    pub slump: Option<f64>,
    /// 气温 (F)
    pub air_temp: Option<f64>,
    /// 料温 (F)
    pub material_temp: Option<f64>,

    pub cylinders: Vec<Cylinder>,

    pub review_status: ReviewStatus,
    pub record_rev: i32,
    pub created_by: String,
    pub created_at: String,
}

impl Sample {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sample_no: String,
        project_id: String,
        material_family: MaterialFamily,
        cast_date: NaiveDate,
        design_psi: f64,
        location: String,
        created_by: String,
    ) -> Self {
        let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        Self {
            sample_id: Uuid::new_v4().to_string(),
            sample_no,
            project_id,
            material_family,
            cast_date,
            design_psi,
            location,
            supplier: None,
            mix_design: None,
            ticket_number: None,
            truck_number: None,
            slump: None,
            air_temp: None,
            material_temp: None,
            cylinders: Vec::new(),
            review_status: ReviewStatus::Pending,
            record_rev: 1,
            created_by,
            created_at: now,
        }
    }

    /// 派生试样状态: 全部试块均有实测强度 -> COMPLETED
    pub fn status(&self) -> SampleStatus {
        if !self.cylinders.is_empty() && self.cylinders.iter().all(|c| c.measured_psi.is_some()) {
            SampleStatus::Completed
        } else {
            SampleStatus::Pending
        }
    }

    /// 设计龄期 = 排程中最大的龄期天数 (默认排程下为 28 天)
    pub fn design_age_days(&self) -> Option<i64> {
        self.cylinders.iter().map(|c| c.age_days).max()
    }
}

impl Cylinder {
    pub fn new(sample_id: &str, seq: u32, age_days: i64, cast_date: NaiveDate, cylinder_type: &str) -> Self {
        Self {
            cylinder_id: Uuid::new_v4().to_string(),
            sample_id: sample_id.to_string(),
            seq,
            age_days,
            scheduled_date: cast_date + Duration::days(age_days),
            measured_psi: None,
            cylinder_type: cylinder_type.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_with_cylinders() -> Sample {
        let cast = NaiveDate::from_ymd_opt(2024, 2, 20).unwrap();
        let mut s = Sample::new(
            "S-24-1010".to_string(),
            "J-24-101".to_string(),
            MaterialFamily::Concrete,
            cast,
            4000.0,
            "Column Line 4".to_string(),
            "u1".to_string(),
        );
        s.cylinders = vec![
            Cylinder::new(&s.sample_id, 1, 7, cast, "4x8"),
            Cylinder::new(&s.sample_id, 2, 28, cast, "4x8"),
        ];
        s
    }

    #[test]
    fn test_scheduled_date_is_cast_plus_age() {
        let s = sample_with_cylinders();
        assert_eq!(
            s.cylinders[0].scheduled_date,
            NaiveDate::from_ymd_opt(2024, 2, 27).unwrap()
        );
        assert_eq!(
            s.cylinders[1].scheduled_date,
            NaiveDate::from_ymd_opt(2024, 3, 19).unwrap()
        );
    }

    #[test]
    fn test_status_derivation() {
        let mut s = sample_with_cylinders();
        assert_eq!(s.status(), SampleStatus::Pending);
        s.cylinders[0].measured_psi = Some(3200.0);
        assert_eq!(s.status(), SampleStatus::Pending);
        s.cylinders[1].measured_psi = Some(4450.0);
        assert_eq!(s.status(), SampleStatus::Completed);
    }

    #[test]
    fn test_design_age_is_max_age() {
        let s = sample_with_cylinders();
        assert_eq!(s.design_age_days(), Some(28));
    }
}
