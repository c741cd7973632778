// ==========================================
// 工程材料检测数据系统 - 复测链引擎
// ==========================================
// 职责: 不合格记录 -> 复测记录的链接校验与链遍历
// 约束: 每条记录最多一条复测出边; 链接双方须同项目、同材料大类、同部位
// 红线: 链上不得有环; 遍历必须带访问集防御脏数据
// ==========================================

use crate::domain::field_test::FieldTestResult;
use crate::domain::retest::RetestLink;
use crate::engine::error::{EngineError, EngineResult};
use std::collections::HashSet;

pub struct RetestLinkage;

impl RetestLinkage {
    /// 校验一条待建链接 (failing -> retest)
    ///
    /// 调用方传入现有链接全集; 本函数只做纯校验, 不落库。
    pub fn validate_link(
        links: &[RetestLink],
        failing: &FieldTestResult,
        retest: &FieldTestResult,
    ) -> EngineResult<()> {
        if failing.test_id == retest.test_id {
            return Err(EngineError::SelfLink {
                test_id: failing.test_id.clone(),
            });
        }

        if links.iter().any(|l| l.failing_test_id == failing.test_id) {
            return Err(EngineError::AlreadyLinked {
                test_id: failing.test_id.clone(),
            });
        }

        if failing.project_id != retest.project_id {
            return Err(EngineError::MismatchedRetest {
                reason: format!(
                    "项目不一致: {} vs {}",
                    failing.project_id, retest.project_id
                ),
            });
        }
        if failing.material_family != retest.material_family {
            return Err(EngineError::MismatchedRetest {
                reason: format!(
                    "材料大类不一致: {} vs {}",
                    failing.material_family, retest.material_family
                ),
            });
        }
        if failing.location != retest.location {
            return Err(EngineError::MismatchedRetest {
                reason: format!("部位不一致: {} vs {}", failing.location, retest.location),
            });
        }

        // 环检测: 从 retest 沿出边前向遍历, 若能回到 failing 则成环
        let mut visited: HashSet<&str> = HashSet::new();
        let mut current = retest.test_id.as_str();
        while visited.insert(current) {
            let Some(next) = links
                .iter()
                .find(|l| l.failing_test_id == current)
                .map(|l| l.retest_test_id.as_str())
            else {
                break;
            };
            if next == failing.test_id {
                return Err(EngineError::CycleDetected {
                    test_id: failing.test_id.clone(),
                });
            }
            current = next;
        }

        Ok(())
    }

    /// 复测链: 从给定记录沿入边回溯到最初的不合格记录
    ///
    /// 返回 [本记录, 被其复测的记录, ...], 链首为传入记录。
    /// 访问集防御脏数据中的环, 遍历保证终止。
    pub fn chain_of(links: &[RetestLink], test_id: &str) -> Vec<String> {
        let mut chain = vec![test_id.to_string()];
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(test_id.to_string());

        let mut current = test_id.to_string();
        while let Some(prev) = links
            .iter()
            .find(|l| l.retest_test_id == current)
            .map(|l| l.failing_test_id.clone())
        {
            if !visited.insert(prev.clone()) {
                break;
            }
            chain.push(prev.clone());
            current = prev;
        }
        chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::field_test::{DerivedResult, RawReadings};
    use crate::domain::types::{MaterialFamily, Verdict};
    use chrono::NaiveDate;

    fn test_record(test_no: &str, location: &str) -> FieldTestResult {
        FieldTestResult::new(
            test_no.to_string(),
            "J-24-101".to_string(),
            MaterialFamily::Soil,
            location.to_string(),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            "Alex Field".to_string(),
            "spec-1".to_string(),
            1,
            RawReadings::default(),
            DerivedResult {
                derived_value: 109.5,
                percent: 94.8,
            },
            Verdict::Fail,
            "u1".to_string(),
        )
    }

    fn link(failing: &FieldTestResult, retest: &FieldTestResult) -> RetestLink {
        RetestLink::new(
            failing.test_id.clone(),
            retest.test_id.clone(),
            "u2".to_string(),
        )
    }

    #[test]
    fn test_valid_link_accepted() {
        let a = test_record("24-001", "Building Pad");
        let b = test_record("24-002", "Building Pad");
        assert!(RetestLinkage::validate_link(&[], &a, &b).is_ok());
    }

    #[test]
    fn test_self_link_rejected() {
        let a = test_record("24-001", "Building Pad");
        let err = RetestLinkage::validate_link(&[], &a, &a).unwrap_err();
        assert!(matches!(err, EngineError::SelfLink { .. }));
    }

    #[test]
    fn test_one_outgoing_edge_per_record() {
        let a = test_record("24-001", "Building Pad");
        let b = test_record("24-002", "Building Pad");
        let c = test_record("24-003", "Building Pad");
        let links = vec![link(&a, &b)];
        let err = RetestLinkage::validate_link(&links, &a, &c).unwrap_err();
        assert!(matches!(err, EngineError::AlreadyLinked { .. }));
    }

    #[test]
    fn test_mismatched_location_rejected() {
        let a = test_record("24-001", "Building Pad");
        let b = test_record("24-002", "Access Road");
        let err = RetestLinkage::validate_link(&[], &a, &b).unwrap_err();
        assert!(matches!(err, EngineError::MismatchedRetest { .. }));
    }

    #[test]
    fn test_mismatched_family_rejected() {
        let a = test_record("24-001", "Building Pad");
        let mut b = test_record("24-002", "Building Pad");
        b.material_family = MaterialFamily::Asphalt;
        let err = RetestLinkage::validate_link(&[], &a, &b).unwrap_err();
        assert!(matches!(err, EngineError::MismatchedRetest { .. }));
    }

    #[test]
    fn test_cycle_detected() {
        // A -> B -> C 已存在; 建 C -> A 成环
        let a = test_record("24-001", "Building Pad");
        let b = test_record("24-002", "Building Pad");
        let c = test_record("24-003", "Building Pad");
        let links = vec![link(&a, &b), link(&b, &c)];
        let err = RetestLinkage::validate_link(&links, &c, &a).unwrap_err();
        assert!(matches!(err, EngineError::CycleDetected { .. }));
    }

    #[test]
    fn test_chain_walks_back_to_origin() {
        // A(不合格) <- B(复测) <- C(复测的复测)
        let a = test_record("24-001", "Building Pad");
        let b = test_record("24-002", "Building Pad");
        let c = test_record("24-003", "Building Pad");
        let links = vec![link(&a, &b), link(&b, &c)];
        let chain = RetestLinkage::chain_of(&links, &c.test_id);
        assert_eq!(
            chain,
            vec![c.test_id.clone(), b.test_id.clone(), a.test_id.clone()]
        );
    }

    #[test]
    fn test_chain_of_unlinked_record_is_singleton() {
        let a = test_record("24-001", "Building Pad");
        let chain = RetestLinkage::chain_of(&[], &a.test_id);
        assert_eq!(chain, vec![a.test_id.clone()]);
    }

    #[test]
    fn test_chain_terminates_on_dirty_cycle() {
        // 脏数据直接构造 A <-> B 环, 遍历必须终止
        let a = test_record("24-001", "Building Pad");
        let b = test_record("24-002", "Building Pad");
        let links = vec![link(&a, &b), link(&b, &a)];
        let chain = RetestLinkage::chain_of(&links, &b.test_id);
        assert_eq!(chain.len(), 2);
    }
}
