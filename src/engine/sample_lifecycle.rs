// ==========================================
// 工程材料检测数据系统 - 试样生命周期引擎
// ==========================================
// 职责: 破型排程展开 / 到期推算 / 破型录入守卫
// 约束: 展开后试块总数 = 排程 count 合计; 计划破型日 = 浇筑日 + 龄期
// 红线: 实测强度一经录入不可覆盖
// ==========================================

use crate::domain::sample::{BreakItem, Cylinder, Sample};
use crate::domain::types::ScheduleStatus;
use crate::engine::error::{EngineError, EngineResult};
use chrono::NaiveDate;

pub struct SampleLifecycle;

impl SampleLifecycle {
    /// 展开破型排程为试块清单
    ///
    /// 按龄期升序展开, 试样内序号从 1 连续递增。
    /// 排程为空、龄期非正或数量为 0 均视为无效排程。
    pub fn expand_schedule(
        sample_id: &str,
        cast_date: NaiveDate,
        schedule: &[BreakItem],
        cylinder_type: &str,
    ) -> EngineResult<Vec<Cylinder>> {
        if schedule.is_empty() {
            return Err(EngineError::NotComputable {
                reason: "破型排程为空".to_string(),
            });
        }
        for item in schedule {
            if item.age_days <= 0 {
                return Err(EngineError::NotComputable {
                    reason: format!("排程龄期无效: {} 天", item.age_days),
                });
            }
            if item.count == 0 {
                return Err(EngineError::NotComputable {
                    reason: format!("排程龄期 {} 天的试块数量为 0", item.age_days),
                });
            }
        }

        let mut sorted: Vec<BreakItem> = schedule.to_vec();
        sorted.sort_by_key(|item| item.age_days);

        let mut cylinders = Vec::new();
        let mut seq: u32 = 0;
        for item in &sorted {
            for _ in 0..item.count {
                seq += 1;
                cylinders.push(Cylinder::new(
                    sample_id,
                    seq,
                    item.age_days,
                    cast_date,
                    cylinder_type,
                ));
            }
        }
        Ok(cylinders)
    }

    /// 下一到期日: 尚无实测强度的试块中最早的计划破型日
    pub fn next_due(sample: &Sample) -> Option<NaiveDate> {
        sample
            .cylinders
            .iter()
            .filter(|c| c.measured_psi.is_none())
            .map(|c| c.scheduled_date)
            .min()
    }

    /// 排程状态 (相对 today)
    ///
    /// 全部实测完成 -> COMPLETE; 否则按 next_due 与 today 比较:
    /// 之前 -> OVERDUE, 当天 -> DUE_TODAY, 之后 -> SCHEDULED
    pub fn schedule_status(sample: &Sample, today: NaiveDate) -> ScheduleStatus {
        match Self::next_due(sample) {
            None => ScheduleStatus::Complete,
            Some(due) if due < today => ScheduleStatus::Overdue,
            Some(due) if due == today => ScheduleStatus::DueToday,
            Some(_) => ScheduleStatus::Scheduled,
        }
    }

    /// 破型录入: 对指定试块写入实测强度
    ///
    /// # 错误
    /// - InvalidCylinder: 试块不属于该试样
    /// - DuplicateBreak: 试块已有实测强度
    /// - NotComputable: 强度非正或非有限值
    pub fn record_break(
        sample: &mut Sample,
        cylinder_id: &str,
        measured_psi: f64,
    ) -> EngineResult<()> {
        if !measured_psi.is_finite() || measured_psi <= 0.0 {
            return Err(EngineError::NotComputable {
                reason: format!("实测强度无效: {}", measured_psi),
            });
        }

        let sample_id = sample.sample_id.clone();
        let cylinder = sample
            .cylinders
            .iter_mut()
            .find(|c| c.cylinder_id == cylinder_id)
            .ok_or_else(|| EngineError::InvalidCylinder {
                sample_id,
                cylinder_id: cylinder_id.to_string(),
            })?;

        if cylinder.measured_psi.is_some() {
            return Err(EngineError::DuplicateBreak {
                cylinder_id: cylinder_id.to_string(),
            });
        }

        cylinder.measured_psi = Some(measured_psi);
        Ok(())
    }
}
