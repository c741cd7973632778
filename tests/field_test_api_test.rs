// ==========================================
// 现场检测 API 集成测试
// ==========================================
// 职责: 验证录入/编辑/复测链的完整业务流程
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod field_test_api_test {
    use chrono::NaiveDate;
    use cmt_fieldops::api::{ApiError, FieldTestEdit, NewFieldTest, ReviewTarget};
    use cmt_fieldops::domain::field_test::RawReadings;
    use cmt_fieldops::domain::types::{MaterialFamily, ReviewStatus, Verdict};

    use crate::test_helpers::{
        asphalt_spec_fields, employee, manager, seed_soil_spec, setup_app,
    };

    fn soil_request(project_id: &str, location: &str, wet: f64, moisture: f64) -> NewFieldTest {
        NewFieldTest {
            project_id: project_id.to_string(),
            material_family: MaterialFamily::Soil,
            location: location.to_string(),
            elevation: Some("Subgrade".to_string()),
            test_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            inspector: "Alex Field".to_string(),
            gauge_number: Some("NDG-04".to_string()),
            raw: RawReadings {
                wet_density: Some(wet),
                moisture_pct: Some(moisture),
                measured_psi: None,
            },
        }
    }

    #[test]
    fn test_record_soil_test_pass() {
        let (_tmp, state) = setup_app();
        seed_soil_spec(&state, "J-24-101", "Building Pad");

        // dry = 123.0 / 1.09 = 112.84, comp = 95.22% >= 95, 含水率 9.0 在 [7, 11] 带内
        let test = state
            .field_test_api
            .record_test(soil_request("J-24-101", "Building Pad", 123.0, 9.0), &employee())
            .unwrap();

        assert_eq!(test.verdict, Verdict::Pass);
        assert_eq!(test.review_status, ReviewStatus::Pending);
        assert_eq!(test.record_rev, 1);
        assert_eq!(test.test_no, "24-001");
        assert_eq!(test.spec_revision, 1);
        assert!((test.derived.percent - 95.22).abs() < 0.01);
    }

    #[test]
    fn test_record_soil_test_fail_still_saved() {
        let (_tmp, state) = setup_app();
        seed_soil_spec(&state, "J-24-101", "Building Pad");

        // dry = 118.5 / 1.082 = 109.52, comp = 92.42% < 95 -> 不合格但照常落库
        let test = state
            .field_test_api
            .record_test(soil_request("J-24-101", "Building Pad", 118.5, 8.2), &employee())
            .unwrap();

        assert_eq!(test.verdict, Verdict::Fail);
        let listed = state.field_test_api.list_by_project("J-24-101").unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].test_id, test.test_id);
    }

    #[test]
    fn test_record_without_spec_rejected() {
        let (_tmp, state) = setup_app();

        let err = state
            .field_test_api
            .record_test(soil_request("J-24-101", "Building Pad", 123.0, 9.0), &employee())
            .unwrap_err();
        assert!(matches!(err, ApiError::SpecNotFound(_)));
    }

    #[test]
    fn test_test_no_sequence_per_project() {
        let (_tmp, state) = setup_app();
        seed_soil_spec(&state, "J-24-101", "Building Pad");

        let first = state
            .field_test_api
            .record_test(soil_request("J-24-101", "Building Pad", 123.0, 9.0), &employee())
            .unwrap();
        let second = state
            .field_test_api
            .record_test(soil_request("J-24-101", "Building Pad", 122.0, 8.5), &employee())
            .unwrap();

        assert_eq!(first.test_no, "24-001");
        assert_eq!(second.test_no, "24-002");
    }

    #[test]
    fn test_update_recomputes_verdict_and_bumps_rev() {
        let (_tmp, state) = setup_app();
        seed_soil_spec(&state, "J-24-101", "Building Pad");

        let test = state
            .field_test_api
            .record_test(soil_request("J-24-101", "Building Pad", 118.5, 8.2), &employee())
            .unwrap();
        assert_eq!(test.verdict, Verdict::Fail);

        let updated = state
            .field_test_api
            .update_test(
                FieldTestEdit {
                    test_id: test.test_id.clone(),
                    expected_rev: 1,
                    location: test.location.clone(),
                    elevation: test.elevation.clone(),
                    test_date: test.test_date,
                    inspector: test.inspector.clone(),
                    gauge_number: test.gauge_number.clone(),
                    raw: RawReadings {
                        wet_density: Some(123.0),
                        moisture_pct: Some(9.0),
                        measured_psi: None,
                    },
                },
                &employee(),
            )
            .unwrap();

        assert_eq!(updated.verdict, Verdict::Pass);
        assert_eq!(updated.record_rev, 2);
        // 部位未变 -> 沿用原规格修订
        assert_eq!(updated.spec_id, test.spec_id);
    }

    #[test]
    fn test_update_with_stale_rev_rejected() {
        let (_tmp, state) = setup_app();
        seed_soil_spec(&state, "J-24-101", "Building Pad");

        let test = state
            .field_test_api
            .record_test(soil_request("J-24-101", "Building Pad", 123.0, 9.0), &employee())
            .unwrap();

        let edit = FieldTestEdit {
            test_id: test.test_id.clone(),
            expected_rev: 1,
            location: test.location.clone(),
            elevation: None,
            test_date: test.test_date,
            inspector: test.inspector.clone(),
            gauge_number: None,
            raw: test.raw.clone(),
        };

        // 第一次写入成功, record_rev 变为 2
        state.field_test_api.update_test(edit.clone(), &employee()).unwrap();
        // 仍带 expected_rev=1 的并发写入被拒绝
        let err = state.field_test_api.update_test(edit, &employee()).unwrap_err();
        assert!(matches!(err, ApiError::StaleRecord(_)));
    }

    #[test]
    fn test_approved_record_locked_for_edit() {
        let (_tmp, state) = setup_app();
        seed_soil_spec(&state, "J-24-101", "Building Pad");

        let test = state
            .field_test_api
            .record_test(soil_request("J-24-101", "Building Pad", 123.0, 9.0), &employee())
            .unwrap();

        state
            .review_api
            .set_status(
                ReviewTarget::FieldTest,
                &test.test_id,
                ReviewStatus::Approved,
                1,
                &manager(),
            )
            .unwrap();

        let err = state
            .field_test_api
            .update_test(
                FieldTestEdit {
                    test_id: test.test_id.clone(),
                    expected_rev: 2,
                    location: test.location.clone(),
                    elevation: None,
                    test_date: test.test_date,
                    inspector: test.inspector.clone(),
                    gauge_number: None,
                    raw: test.raw.clone(),
                },
                &employee(),
            )
            .unwrap_err();
        assert!(matches!(err, ApiError::LockedRecord(_)));
    }

    #[test]
    fn test_retest_chain_walks_back_to_first_failure() {
        let (_tmp, state) = setup_app();
        seed_soil_spec(&state, "J-24-101", "Building Pad");

        let a = state
            .field_test_api
            .record_test(soil_request("J-24-101", "Building Pad", 118.5, 8.2), &employee())
            .unwrap();
        let b = state
            .field_test_api
            .record_test(soil_request("J-24-101", "Building Pad", 119.5, 8.4), &employee())
            .unwrap();
        let c = state
            .field_test_api
            .record_test(soil_request("J-24-101", "Building Pad", 123.0, 9.0), &employee())
            .unwrap();

        state
            .field_test_api
            .link_retest(&a.test_id, &b.test_id, &employee())
            .unwrap();
        state
            .field_test_api
            .link_retest(&b.test_id, &c.test_id, &employee())
            .unwrap();

        let chain = state.field_test_api.retest_chain(&c.test_id).unwrap();
        let ids: Vec<&str> = chain.iter().map(|t| t.test_id.as_str()).collect();
        assert_eq!(ids, vec![c.test_id.as_str(), b.test_id.as_str(), a.test_id.as_str()]);
    }

    #[test]
    fn test_failing_test_allows_only_one_outgoing_link() {
        let (_tmp, state) = setup_app();
        seed_soil_spec(&state, "J-24-101", "Building Pad");

        let a = state
            .field_test_api
            .record_test(soil_request("J-24-101", "Building Pad", 118.5, 8.2), &employee())
            .unwrap();
        let b = state
            .field_test_api
            .record_test(soil_request("J-24-101", "Building Pad", 123.0, 9.0), &employee())
            .unwrap();
        let c = state
            .field_test_api
            .record_test(soil_request("J-24-101", "Building Pad", 122.5, 9.1), &employee())
            .unwrap();

        state
            .field_test_api
            .link_retest(&a.test_id, &b.test_id, &employee())
            .unwrap();
        let err = state
            .field_test_api
            .link_retest(&a.test_id, &c.test_id, &employee())
            .unwrap_err();
        assert!(matches!(err, ApiError::AlreadyLinked(_)));
    }

    #[test]
    fn test_self_link_rejected() {
        let (_tmp, state) = setup_app();
        seed_soil_spec(&state, "J-24-101", "Building Pad");

        let a = state
            .field_test_api
            .record_test(soil_request("J-24-101", "Building Pad", 118.5, 8.2), &employee())
            .unwrap();
        let err = state
            .field_test_api
            .link_retest(&a.test_id, &a.test_id, &employee())
            .unwrap_err();
        assert!(matches!(err, ApiError::SelfLink(_)));
    }

    #[test]
    fn test_mismatched_location_link_rejected() {
        let (_tmp, state) = setup_app();
        seed_soil_spec(&state, "J-24-101", "Building Pad");
        seed_soil_spec(&state, "J-24-101", "North Wall");

        let a = state
            .field_test_api
            .record_test(soil_request("J-24-101", "Building Pad", 118.5, 8.2), &employee())
            .unwrap();
        let b = state
            .field_test_api
            .record_test(soil_request("J-24-101", "North Wall", 123.0, 9.0), &employee())
            .unwrap();

        let err = state
            .field_test_api
            .link_retest(&a.test_id, &b.test_id, &employee())
            .unwrap_err();
        assert!(matches!(err, ApiError::MismatchedRetest(_)));
    }

    #[test]
    fn test_asphalt_two_sided_band() {
        let (_tmp, state) = setup_app();
        state
            .spec_api
            .create_spec(
                "J-24-102",
                MaterialFamily::Asphalt,
                "Lot 3",
                asphalt_spec_fields(),
                &manager(),
            )
            .unwrap();

        // comp = 145.2 / 148.5 = 97.78% > 97 -> 超出双侧带上限
        let over = state
            .field_test_api
            .record_test(
                NewFieldTest {
                    project_id: "J-24-102".to_string(),
                    material_family: MaterialFamily::Asphalt,
                    location: "Lot 3".to_string(),
                    elevation: None,
                    test_date: NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
                    inspector: "Alex Field".to_string(),
                    gauge_number: None,
                    raw: RawReadings {
                        wet_density: Some(145.2),
                        moisture_pct: None,
                        measured_psi: None,
                    },
                },
                &employee(),
            )
            .unwrap();
        assert_eq!(over.verdict, Verdict::Fail);

        // comp = 140.0 / 148.5 = 94.28%, 落在 [92, 97] 带内
        let within = state
            .field_test_api
            .record_test(
                NewFieldTest {
                    project_id: "J-24-102".to_string(),
                    material_family: MaterialFamily::Asphalt,
                    location: "Lot 3".to_string(),
                    elevation: None,
                    test_date: NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
                    inspector: "Alex Field".to_string(),
                    gauge_number: None,
                    raw: RawReadings {
                        wet_density: Some(140.0),
                        moisture_pct: None,
                        measured_psi: None,
                    },
                },
                &employee(),
            )
            .unwrap();
        assert_eq!(within.verdict, Verdict::Pass);
    }
}
