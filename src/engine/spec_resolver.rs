// ==========================================
// 工程材料检测数据系统 - 规格解析与合格判定
// ==========================================
// 职责: (项目, 材料大类, 部位) 精确匹配 active 规格修订; 对派生量做合格判定
// 红线: 不做模糊匹配, 未配置规格直接报 SpecNotFound
// 红线: 判定输出附带可读理由, 与判定结论同源
// ==========================================

use crate::domain::field_test::{DerivedResult, RawReadings};
use crate::domain::specification::Specification;
use crate::domain::types::{MaterialFamily, Verdict};
use crate::engine::error::{EngineError, EngineResult};
use tracing::warn;

/// 判定结论 + 可读理由 (理由用于前端即时反馈与审核参考)
#[derive(Debug, Clone, PartialEq)]
pub struct Judgement {
    pub verdict: Verdict,
    pub reasons: Vec<String>,
}

pub struct SpecResolver;

impl SpecResolver {
    /// 在规格集合中解析 (project, family, location) 的 active 修订
    ///
    /// 调用方传入仓储查出的候选集; 本函数只做纯匹配。
    /// 同一部位理论上仅一条 active 修订, 若数据异常存在多条, 取修订号最大者。
    pub fn resolve<'a>(
        specs: &'a [Specification],
        project_id: &str,
        material_family: MaterialFamily,
        location: &str,
    ) -> EngineResult<&'a Specification> {
        specs
            .iter()
            .filter(|s| {
                s.active
                    && s.project_id == project_id
                    && s.material_family == material_family
                    && s.location_name == location
            })
            .max_by_key(|s| s.revision)
            .ok_or_else(|| EngineError::SpecNotFound {
                project_id: project_id.to_string(),
                material_family,
                location: location.to_string(),
            })
    }

    /// 合格判定
    ///
    /// # 规则
    /// - SOIL: 压实度 >= min_compaction 且含水率落在部位级带宽内;
    ///   未配置带宽时退回全局容差 (最优含水率 ± legacy_moisture_tolerance)
    /// - ASPHALT: 压实度落在 [min_compaction, max_compaction] 双侧带内
    /// - CONCRETE/GROUT: 强度百分比 >= 100 即合格
    ///
    /// 判定前百分比不做四舍五入。
    pub fn judge(
        spec: &Specification,
        material_family: MaterialFamily,
        raw: &RawReadings,
        derived: &DerivedResult,
        legacy_moisture_tolerance: f64,
    ) -> EngineResult<Judgement> {
        match material_family {
            MaterialFamily::Soil => Self::judge_soil(spec, raw, derived, legacy_moisture_tolerance),
            MaterialFamily::Asphalt => Self::judge_asphalt(spec, derived),
            MaterialFamily::Concrete | MaterialFamily::Grout => Self::judge_strength(derived),
        }
    }

    fn judge_soil(
        spec: &Specification,
        raw: &RawReadings,
        derived: &DerivedResult,
        legacy_moisture_tolerance: f64,
    ) -> EngineResult<Judgement> {
        let mut reasons: Vec<String> = Vec::new();
        let mut pass = true;

        let Some(min_compaction) = spec.min_compaction else {
            return Err(EngineError::NotComputable {
                reason: "规格缺少最低压实度界限".to_string(),
            });
        };
        if derived.percent >= min_compaction {
            reasons.push(format!(
                "压实度 {:.1}% >= 界限 {:.1}%",
                derived.percent, min_compaction
            ));
        } else {
            pass = false;
            reasons.push(format!(
                "压实度 {:.1}% < 界限 {:.1}%",
                derived.percent, min_compaction
            ));
        }

        // 含水率判据与压实度判据同等强制: 规格不完整不得得出仅凭压实度的合格
        let Some(optimum) = spec.optimum_moisture else {
            return Err(EngineError::NotComputable {
                reason: "规格缺少最优含水率".to_string(),
            });
        };
        let Some(moisture) = raw.moisture_pct else {
            return Err(EngineError::NotComputable {
                reason: "缺少含水率读数".to_string(),
            });
        };

        // 含水率带宽: 部位级为准; 未配置时退回全局容差并告警
        let (lo, hi) = if spec.has_moisture_band() {
            (
                optimum + spec.min_moisture_delta.unwrap_or(0.0),
                optimum + spec.max_moisture_delta.unwrap_or(0.0),
            )
        } else {
            warn!(
                spec_id = %spec.spec_id,
                location = %spec.location_name,
                tolerance = legacy_moisture_tolerance,
                "规格未配置含水率带宽, 退回全局容差"
            );
            (
                optimum - legacy_moisture_tolerance,
                optimum + legacy_moisture_tolerance,
            )
        };
        if moisture >= lo && moisture <= hi {
            reasons.push(format!(
                "含水率 {:.1}% 在带宽 [{:.1}%, {:.1}%] 内",
                moisture, lo, hi
            ));
        } else {
            pass = false;
            reasons.push(format!(
                "含水率 {:.1}% 超出带宽 [{:.1}%, {:.1}%]",
                moisture, lo, hi
            ));
        }

        Ok(Judgement {
            verdict: if pass { Verdict::Pass } else { Verdict::Fail },
            reasons,
        })
    }

    fn judge_asphalt(spec: &Specification, derived: &DerivedResult) -> EngineResult<Judgement> {
        let (Some(min_c), Some(max_c)) = (spec.min_compaction, spec.max_compaction) else {
            return Err(EngineError::NotComputable {
                reason: "规格缺少沥青压实度双侧界限".to_string(),
            });
        };

        let pass = derived.percent >= min_c && derived.percent <= max_c;
        let reason = if pass {
            format!(
                "压实度 {:.1}% 在带宽 [{:.1}%, {:.1}%] 内",
                derived.percent, min_c, max_c
            )
        } else {
            format!(
                "压实度 {:.1}% 超出带宽 [{:.1}%, {:.1}%]",
                derived.percent, min_c, max_c
            )
        };

        Ok(Judgement {
            verdict: if pass { Verdict::Pass } else { Verdict::Fail },
            reasons: vec![reason],
        })
    }

    fn judge_strength(derived: &DerivedResult) -> EngineResult<Judgement> {
        let pass = derived.percent >= 100.0;
        let reason = if pass {
            format!("强度百分比 {:.1}% >= 100%", derived.percent)
        } else {
            format!("强度百分比 {:.1}% < 100%", derived.percent)
        };
        Ok(Judgement {
            verdict: if pass { Verdict::Pass } else { Verdict::Fail },
            reasons: vec![reason],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn soil_spec() -> Specification {
        let mut spec = Specification::new(
            "J-24-101".to_string(),
            MaterialFamily::Soil,
            "Building Pad".to_string(),
            "admin".to_string(),
        );
        spec.max_dry_density = Some(115.5);
        spec.optimum_moisture = Some(9.0);
        spec.min_compaction = Some(95.0);
        spec.min_moisture_delta = Some(-2.0);
        spec.max_moisture_delta = Some(2.0);
        spec
    }

    fn asphalt_spec() -> Specification {
        let mut spec = Specification::new(
            "J-24-101".to_string(),
            MaterialFamily::Asphalt,
            "Access Road".to_string(),
            "admin".to_string(),
        );
        spec.target_density = Some(148.5);
        spec.min_compaction = Some(92.0);
        spec.max_compaction = Some(97.0);
        spec
    }

    // ==========================================
    // 测试 1: 规格解析
    // ==========================================

    #[test]
    fn test_resolve_exact_match() {
        let specs = vec![soil_spec(), asphalt_spec()];
        let found = SpecResolver::resolve(&specs, "J-24-101", MaterialFamily::Soil, "Building Pad")
            .expect("should resolve");
        assert_eq!(found.material_family, MaterialFamily::Soil);
    }

    #[test]
    fn test_resolve_no_fuzzy_match() {
        let specs = vec![soil_spec()];
        // 部位名不完全一致 -> 不匹配
        let err = SpecResolver::resolve(&specs, "J-24-101", MaterialFamily::Soil, "Building pad")
            .unwrap_err();
        assert!(matches!(err, EngineError::SpecNotFound { .. }));
    }

    #[test]
    fn test_resolve_skips_inactive_revisions() {
        let mut old = soil_spec();
        old.active = false;
        old.revision = 1;
        let mut new = soil_spec();
        new.revision = 2;
        new.min_compaction = Some(98.0);
        let specs = vec![old, new];
        let found = SpecResolver::resolve(&specs, "J-24-101", MaterialFamily::Soil, "Building Pad")
            .expect("should resolve");
        assert_eq!(found.revision, 2);
        assert_eq!(found.min_compaction, Some(98.0));
    }

    // ==========================================
    // 测试 2: SOIL 判定
    // ==========================================

    fn soil_raw(moisture: f64) -> RawReadings {
        RawReadings {
            wet_density: Some(118.5),
            moisture_pct: Some(moisture),
            measured_psi: None,
        }
    }

    #[test]
    fn test_soil_pass_requires_both_conditions() {
        let spec = soil_spec();
        // 压实度 96% 且含水率在带宽内 -> PASS
        let good = DerivedResult {
            derived_value: 110.9,
            percent: 96.0,
        };
        let j = SpecResolver::judge(&spec, MaterialFamily::Soil, &soil_raw(8.5), &good, 3.0)
            .expect("judge");
        assert_eq!(j.verdict, Verdict::Pass);
        assert_eq!(j.reasons.len(), 2);

        // 压实度达标但含水率超带宽 -> FAIL
        let j = SpecResolver::judge(&spec, MaterialFamily::Soil, &soil_raw(12.5), &good, 3.0)
            .expect("judge");
        assert_eq!(j.verdict, Verdict::Fail);

        // 压实度不足 -> FAIL
        let low = DerivedResult {
            derived_value: 109.5,
            percent: 94.8,
        };
        let j = SpecResolver::judge(&spec, MaterialFamily::Soil, &soil_raw(8.5), &low, 3.0)
            .expect("judge");
        assert_eq!(j.verdict, Verdict::Fail);
    }

    #[test]
    fn test_soil_falls_back_to_legacy_tolerance() {
        let mut spec = soil_spec();
        spec.min_moisture_delta = None;
        spec.max_moisture_delta = None;
        let good = DerivedResult {
            derived_value: 110.9,
            percent: 96.0,
        };
        // 最优 9.0, 容差 ±3.0 -> [6.0, 12.0]; 11.5 在内
        let j = SpecResolver::judge(&spec, MaterialFamily::Soil, &soil_raw(11.5), &good, 3.0)
            .expect("judge");
        assert_eq!(j.verdict, Verdict::Pass);
        // 12.5 超出
        let j = SpecResolver::judge(&spec, MaterialFamily::Soil, &soil_raw(12.5), &good, 3.0)
            .expect("judge");
        assert_eq!(j.verdict, Verdict::Fail);
    }

    #[test]
    fn test_soil_missing_limit_is_error() {
        let mut spec = soil_spec();
        spec.min_compaction = None;
        let d = DerivedResult {
            derived_value: 110.9,
            percent: 96.0,
        };
        let err =
            SpecResolver::judge(&spec, MaterialFamily::Soil, &soil_raw(8.5), &d, 3.0).unwrap_err();
        assert!(matches!(err, EngineError::NotComputable { .. }));
    }

    #[test]
    fn test_soil_missing_optimum_moisture_is_error() {
        // 缺最优含水率时不得退化为仅凭压实度的判定
        let mut spec = soil_spec();
        spec.optimum_moisture = None;
        let d = DerivedResult {
            derived_value: 110.9,
            percent: 96.0,
        };
        let err =
            SpecResolver::judge(&spec, MaterialFamily::Soil, &soil_raw(8.5), &d, 3.0).unwrap_err();
        assert!(matches!(err, EngineError::NotComputable { .. }));
    }

    // ==========================================
    // 测试 3: ASPHALT 双侧带判定
    // ==========================================

    #[test]
    fn test_asphalt_two_sided_band() {
        let spec = asphalt_spec();
        let raw = RawReadings::default();
        for (pct, expected) in [
            (91.9, Verdict::Fail),
            (92.0, Verdict::Pass),
            (94.5, Verdict::Pass),
            (97.0, Verdict::Pass),
            (97.1, Verdict::Fail),
        ] {
            let d = DerivedResult {
                derived_value: 145.0,
                percent: pct,
            };
            let j = SpecResolver::judge(&spec, MaterialFamily::Asphalt, &raw, &d, 3.0)
                .expect("judge");
            assert_eq!(j.verdict, expected, "percent={}", pct);
        }
    }

    // ==========================================
    // 测试 4: CONCRETE/GROUT 强度判定
    // ==========================================

    #[test]
    fn test_strength_pass_at_100_percent() {
        let spec = soil_spec(); // 强度判定不读规格字段
        let raw = RawReadings::default();
        for (pct, expected) in [(99.9, Verdict::Fail), (100.0, Verdict::Pass), (111.2, Verdict::Pass)] {
            let d = DerivedResult {
                derived_value: 4000.0,
                percent: pct,
            };
            let j = SpecResolver::judge(&spec, MaterialFamily::Concrete, &raw, &d, 3.0)
                .expect("judge");
            assert_eq!(j.verdict, expected, "percent={}", pct);
        }
    }
}
