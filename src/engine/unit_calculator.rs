// ==========================================
// 工程材料检测数据系统 - 单位换算计算器
// ==========================================
// 职责: 原始读数 -> 工程派生量 (干密度 / 压实度 / 强度百分比)
// 红线: 无状态、无副作用、永不失败 (无效输入返回 NotComputable, 不产生污染数值)
// 红线: 百分比在合格判定前不得四舍五入
// ==========================================

use crate::domain::field_test::{DerivedResult, RawReadings};
use crate::domain::specification::Specification;
use crate::domain::types::MaterialFamily;
use serde::{Deserialize, Serialize};

// ==========================================
// 计算基准 (Proctor / 配合比 / 设计强度)
// ==========================================
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Targets {
    /// 最大干密度 (pcf, SOIL)
    pub max_dry_density: Option<f64>,
    /// 目标密度 (pcf, ASPHALT)
    pub target_density: Option<f64>,
    /// 设计强度 (psi, CONCRETE/GROUT)
    pub design_psi: Option<f64>,
}

impl From<&Specification> for Targets {
    fn from(spec: &Specification) -> Self {
        Self {
            max_dry_density: spec.max_dry_density,
            target_density: spec.target_density,
            design_psi: spec.min_psi,
        }
    }
}

// ==========================================
// 计算结果
// ==========================================
/// 计算结果: 成功得到派生量, 或显式的不可计算原因
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Computation {
    Computed(DerivedResult),
    NotComputable { reason: String },
}

impl Computation {
    fn not_computable(reason: &str) -> Self {
        Computation::NotComputable {
            reason: reason.to_string(),
        }
    }

    pub fn is_computed(&self) -> bool {
        matches!(self, Computation::Computed(_))
    }

    pub fn as_computed(&self) -> Option<&DerivedResult> {
        match self {
            Computation::Computed(d) => Some(d),
            Computation::NotComputable { .. } => None,
        }
    }
}

// ==========================================
// UnitCalculator - 纯函数工具类
// ==========================================
pub struct UnitCalculator;

impl UnitCalculator {
    /// 计算派生工程量
    ///
    /// # 规则
    /// - SOIL: dry = wet / (1 + m/100); 压实度 = dry / max_dry_density * 100
    /// - ASPHALT: 无含水率修正; 压实度 = wet / target_density * 100
    /// - CONCRETE/GROUT: 强度百分比 = measured_psi / design_psi * 100
    ///
    /// # 返回
    /// - Computed { derived_value, percent }: derived_value 为干密度
    ///   (SOIL) / 湿密度 (ASPHALT) / 实测强度 (CONCRETE/GROUT)
    /// - NotComputable: 输入缺失、非有限值或基准值非正
    pub fn compute(family: MaterialFamily, raw: &RawReadings, targets: &Targets) -> Computation {
        match family {
            MaterialFamily::Soil => Self::compute_soil(raw, targets),
            MaterialFamily::Asphalt => Self::compute_asphalt(raw, targets),
            MaterialFamily::Concrete | MaterialFamily::Grout => {
                Self::compute_strength(raw, targets)
            }
        }
    }

    /// SOIL: 干密度与压实度
    fn compute_soil(raw: &RawReadings, targets: &Targets) -> Computation {
        let Some(wet) = positive_finite(raw.wet_density) else {
            return Computation::not_computable("湿密度缺失或无效");
        };
        let Some(moisture) = finite(raw.moisture_pct) else {
            return Computation::not_computable("含水率缺失或无效");
        };
        let Some(max_dry) = positive_finite(targets.max_dry_density) else {
            return Computation::not_computable("最大干密度基准缺失或无效");
        };

        let divisor = 1.0 + moisture / 100.0;
        if divisor <= 0.0 {
            return Computation::not_computable("含水率超出物理范围");
        }

        let dry = wet / divisor;
        let compaction = dry / max_dry * 100.0;
        Computation::Computed(DerivedResult {
            derived_value: dry,
            percent: compaction,
        })
    }

    /// ASPHALT: 压实度 (无含水率修正)
    fn compute_asphalt(raw: &RawReadings, targets: &Targets) -> Computation {
        let Some(wet) = positive_finite(raw.wet_density) else {
            return Computation::not_computable("湿密度缺失或无效");
        };
        let Some(target) = positive_finite(targets.target_density) else {
            return Computation::not_computable("目标密度基准缺失或无效");
        };

        let compaction = wet / target * 100.0;
        Computation::Computed(DerivedResult {
            derived_value: wet,
            percent: compaction,
        })
    }

    /// CONCRETE/GROUT: 强度百分比
    fn compute_strength(raw: &RawReadings, targets: &Targets) -> Computation {
        let Some(psi) = positive_finite(raw.measured_psi) else {
            return Computation::not_computable("实测强度缺失或无效");
        };
        let Some(design) = positive_finite(targets.design_psi) else {
            return Computation::not_computable("设计强度缺失或无效");
        };

        let strength_pct = psi / design * 100.0;
        Computation::Computed(DerivedResult {
            derived_value: psi,
            percent: strength_pct,
        })
    }

    /// 单个试块的强度百分比 (试验室破型录入时的即时计算)
    pub fn strength_percent(measured_psi: f64, design_psi: f64) -> Computation {
        Self::compute_strength(
            &RawReadings {
                measured_psi: Some(measured_psi),
                ..Default::default()
            },
            &Targets {
                design_psi: Some(design_psi),
                ..Default::default()
            },
        )
    }
}

fn finite(v: Option<f64>) -> Option<f64> {
    v.filter(|x| x.is_finite())
}

fn positive_finite(v: Option<f64>) -> Option<f64> {
    v.filter(|x| x.is_finite() && *x > 0.0)
}
