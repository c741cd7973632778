// ==========================================
// 规格管理 API 集成测试
// ==========================================
// 职责: 验证规格的建立/修订/解析与历史可追溯性
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod spec_api_test {
    use chrono::NaiveDate;
    use cmt_fieldops::api::{ApiError, NewFieldTest};
    use cmt_fieldops::domain::field_test::RawReadings;
    use cmt_fieldops::domain::types::MaterialFamily;

    use crate::test_helpers::{employee, manager, seed_soil_spec, setup_app, soil_spec_fields};

    #[test]
    fn test_create_spec_requires_review_permission() {
        let (_tmp, state) = setup_app();
        let err = state
            .spec_api
            .create_spec(
                "J-24-101",
                MaterialFamily::Soil,
                "Building Pad",
                soil_spec_fields(),
                &employee(),
            )
            .unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[test]
    fn test_duplicate_location_rejected() {
        let (_tmp, state) = setup_app();
        seed_soil_spec(&state, "J-24-101", "Building Pad");

        let err = state
            .spec_api
            .create_spec(
                "J-24-101",
                MaterialFamily::Soil,
                "Building Pad",
                soil_spec_fields(),
                &manager(),
            )
            .unwrap_err();
        assert!(matches!(err, ApiError::BusinessRuleViolation(_)));
    }

    #[test]
    fn test_location_resolution_is_exact_match() {
        let (_tmp, state) = setup_app();
        seed_soil_spec(&state, "J-24-101", "Building Pad");

        assert!(state
            .spec_api
            .get_active("J-24-101", MaterialFamily::Soil, "Building Pad")
            .is_ok());
        // 大小写不同视为不同部位, 不做模糊匹配
        let err = state
            .spec_api
            .get_active("J-24-101", MaterialFamily::Soil, "building pad")
            .unwrap_err();
        assert!(matches!(err, ApiError::SpecNotFound(_)));
    }

    #[test]
    fn test_revision_preserves_saved_verdicts() {
        let (_tmp, state) = setup_app();
        seed_soil_spec(&state, "J-24-101", "Building Pad");

        // 按修订 1 判定并保存
        let test = state
            .field_test_api
            .record_test(
                NewFieldTest {
                    project_id: "J-24-101".to_string(),
                    material_family: MaterialFamily::Soil,
                    location: "Building Pad".to_string(),
                    elevation: None,
                    test_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                    inspector: "Alex Field".to_string(),
                    gauge_number: None,
                    raw: RawReadings {
                        wet_density: Some(123.0),
                        moisture_pct: Some(9.0),
                        measured_psi: None,
                    },
                },
                &employee(),
            )
            .unwrap();
        assert_eq!(test.spec_revision, 1);

        // 收紧标准, 产生修订 2
        let old = state
            .spec_api
            .get_active("J-24-101", MaterialFamily::Soil, "Building Pad")
            .unwrap();
        let mut tightened = soil_spec_fields();
        tightened.min_compaction = Some(98.0);
        let revised = state
            .spec_api
            .update_spec(&old.spec_id, tightened, &manager())
            .unwrap();
        assert_eq!(revised.revision, 2);
        assert!(revised.active);

        // 已保存记录仍指向旧修订, 判定可按当时标准复算
        let reloaded = state.field_test_api.get(&test.test_id).unwrap();
        assert_eq!(reloaded.spec_id, test.spec_id);
        assert_eq!(reloaded.spec_revision, 1);

        // 新记录按修订 2 判定
        let active = state
            .spec_api
            .get_active("J-24-101", MaterialFamily::Soil, "Building Pad")
            .unwrap();
        assert_eq!(active.revision, 2);
        assert_eq!(active.min_compaction, Some(98.0));
    }

    #[test]
    fn test_update_requires_active_revision() {
        let (_tmp, state) = setup_app();
        seed_soil_spec(&state, "J-24-101", "Building Pad");

        let rev1 = state
            .spec_api
            .get_active("J-24-101", MaterialFamily::Soil, "Building Pad")
            .unwrap();
        state
            .spec_api
            .update_spec(&rev1.spec_id, soil_spec_fields(), &manager())
            .unwrap();

        // 已停用的修订 1 不可再作为修改基准
        let err = state
            .spec_api
            .update_spec(&rev1.spec_id, soil_spec_fields(), &manager())
            .unwrap_err();
        assert!(matches!(err, ApiError::BusinessRuleViolation(_)));
    }

    #[test]
    fn test_location_cap_per_project_family() {
        let (_tmp, state) = setup_app();
        for i in 0..50 {
            state
                .spec_api
                .create_spec(
                    "J-24-101",
                    MaterialFamily::Soil,
                    &format!("Location {}", i),
                    soil_spec_fields(),
                    &manager(),
                )
                .unwrap();
        }

        let err = state
            .spec_api
            .create_spec(
                "J-24-101",
                MaterialFamily::Soil,
                "Location 50",
                soil_spec_fields(),
                &manager(),
            )
            .unwrap_err();
        assert!(matches!(err, ApiError::BusinessRuleViolation(_)));

        // 其他材料大类不受影响
        assert!(state
            .spec_api
            .create_spec(
                "J-24-101",
                MaterialFamily::Asphalt,
                "Location 50",
                crate::test_helpers::asphalt_spec_fields(),
                &manager(),
            )
            .is_ok());
    }

    #[test]
    fn test_list_locations_returns_active_only() {
        let (_tmp, state) = setup_app();
        seed_soil_spec(&state, "J-24-101", "Building Pad");
        seed_soil_spec(&state, "J-24-101", "North Wall");

        let pad = state
            .spec_api
            .get_active("J-24-101", MaterialFamily::Soil, "Building Pad")
            .unwrap();
        state
            .spec_api
            .update_spec(&pad.spec_id, soil_spec_fields(), &manager())
            .unwrap();

        let listed = state
            .spec_api
            .list_locations("J-24-101", MaterialFamily::Soil)
            .unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|s| s.active));
    }
}
