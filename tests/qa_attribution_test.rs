// ==========================================
// QA 读数追溯集成测试
// ==========================================
// 职责: 验证读数入库后追溯到正确的鸡群/批次
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod qa_attribution_test {
    use std::collections::BTreeMap;

    use hatchery_alloc::config::config_keys;
    use hatchery_alloc::domain::{AttributionWarning, DateRange, LinkageTarget, QaReading};
    use hatchery_alloc::engine::PositionCatalog;
    use hatchery_alloc::{ApiError, LinkageType, MachineMode, QaMetric};

    use crate::test_helpers::{add_batch, add_machine, create_test_state, d};

    #[test]
    fn test_per_position_reading_resolves_occupied_position() {
        println!("\n=== 逐位读数: A-Left-Top 追溯到占用批次 ===");
        let (_tmp, state) = create_test_state();
        add_machine(&state, "M1", 18_000, MachineMode::Multi);
        add_batch(&state, "B1", "F1", d(4, 1), 2_000);

        let all = PositionCatalog::all_positions();
        state
            .allocation_ledger
            .create_allocation("B1", "M1", 2_000, &all[..2], DateRange::incubation(d(4, 1)))
            .unwrap();

        let mut values = BTreeMap::new();
        for p in all.iter() {
            values.insert(*p, 37.8);
        }
        let reading = QaReading::per_position("M1", d(4, 11), QaMetric::Temperature, values);
        let reading_id = reading.reading_id.clone();
        let attribution = state.qa_api.attribute_reading(reading).unwrap();

        assert_eq!(attribution.linkages.len(), 18);
        let top = attribution
            .linkages
            .iter()
            .find(|l| l.target.key() == "A-Left-Top")
            .unwrap();
        assert_eq!(top.resolved_batch_id.as_deref(), Some("B1"));
        assert_eq!(top.resolved_flock_id.as_deref(), Some("F1"));
        assert_eq!(
            attribution.warnings,
            vec![AttributionWarning::UnoccupiedPositions { count: 16 }]
        );

        // 空位置读数照样保存
        let stored = state.qa_api.list_linkages(&reading_id).unwrap();
        assert_eq!(stored.len(), 18);
        assert_eq!(stored.iter().filter(|l| l.is_attributed()).count(), 2);
        assert_eq!(state.qa_api.list_batch_linkages("B1").unwrap().len(), 2);
        println!("✓ 逐位追溯通过");
    }

    #[test]
    fn test_machine_wide_reading_one_linkage_per_flock() {
        println!("\n=== 整机读数: 三个鸡群各一条追溯 ===");
        let (_tmp, state) = create_test_state();
        add_machine(&state, "M1", 18_000, MachineMode::Multi);
        add_batch(&state, "B1", "F1", d(4, 1), 3_000);
        add_batch(&state, "B2", "F2", d(4, 2), 1_000);
        add_batch(&state, "B3", "F3", d(4, 3), 2_000);

        let all = PositionCatalog::all_positions();
        let ledger = &state.allocation_ledger;
        ledger
            .create_allocation("B1", "M1", 3_000, &all[0..3], DateRange::incubation(d(4, 1)))
            .unwrap();
        ledger
            .create_allocation("B2", "M1", 1_000, &all[6..7], DateRange::incubation(d(4, 2)))
            .unwrap();
        ledger
            .create_allocation("B3", "M1", 2_000, &all[12..14], DateRange::incubation(d(4, 3)))
            .unwrap();

        let reading = QaReading::machine_wide("M1", d(4, 11), QaMetric::Humidity, 56.5);
        let attribution = state.qa_api.attribute_reading(reading).unwrap();

        assert_eq!(attribution.linkages.len(), 3);
        assert!(attribution.linkages.iter().all(|l| {
            l.linkage_type == LinkageType::MachineWide && l.target == LinkageTarget::MachineWide
        }));
        assert_eq!(attribution.distinct_flocks(), vec!["F1", "F2", "F3"]);
        assert!(attribution.warnings.is_empty());
        println!("✓ 整机追溯通过");
    }

    #[test]
    fn test_empty_machine_readings() {
        let (_tmp, state) = create_test_state();
        add_machine(&state, "M1", 18_000, MachineMode::Multi);

        let per_position =
            QaReading::per_position("M1", d(4, 11), QaMetric::Temperature, BTreeMap::new());
        let attribution = state.qa_api.attribute_reading(per_position).unwrap();
        assert_eq!(attribution.linkages.len(), 18);
        assert!(attribution.linkages.iter().all(|l| !l.is_attributed()));

        let wide = QaReading::machine_wide("M1", d(4, 11), QaMetric::Angle, 45.0);
        let wide_id = wide.reading_id.clone();
        let attribution = state.qa_api.attribute_reading(wide).unwrap();
        assert!(attribution.linkages.is_empty());
        assert!(matches!(
            attribution.warnings.as_slice(),
            [AttributionWarning::NoOccupant { .. }]
        ));
        // 读数本身已保存
        assert!(state.qa_api.list_linkages(&wide_id).unwrap().is_empty());
    }

    #[test]
    fn test_reattribute_after_late_allocation() {
        let (_tmp, state) = create_test_state();
        add_machine(&state, "S1", 45_000, MachineMode::Single);
        add_batch(&state, "B1", "F1", d(4, 1), 30_000);
        state
            .config_manager
            .set_global_config_value(config_keys::WARN_ON_UNATTRIBUTED, "false")
            .unwrap();

        let reading = QaReading::machine_wide("S1", d(4, 5), QaMetric::Humidity, 52.0);
        let reading_id = reading.reading_id.clone();
        assert!(state.qa_api.attribute_reading(reading).unwrap().linkages.is_empty());

        // 分配补录后重新追溯
        state
            .allocation_ledger
            .create_allocation("B1", "S1", 30_000, &[], DateRange::incubation(d(4, 1)))
            .unwrap();
        let attribution = state.qa_api.reattribute_reading(&reading_id).unwrap();
        assert_eq!(attribution.distinct_flocks(), vec!["F1"]);
        assert_eq!(state.qa_api.list_linkages(&reading_id).unwrap().len(), 1);
        assert_eq!(state.qa_api.reattribute_machine_since("S1", d(4, 1)).unwrap(), 1);
    }

    #[test]
    fn test_unknown_machine_and_invalid_value() {
        let (_tmp, state) = create_test_state();
        add_machine(&state, "M1", 18_000, MachineMode::Multi);

        let unknown = QaReading::machine_wide("M9", d(4, 5), QaMetric::Humidity, 52.0);
        assert!(matches!(
            state.qa_api.attribute_reading(unknown),
            Err(ApiError::NotFound(_))
        ));

        let nan = QaReading::machine_wide("M1", d(4, 5), QaMetric::Humidity, f64::NAN);
        assert!(matches!(
            state.qa_api.attribute_reading(nan),
            Err(ApiError::ValidationError(_))
        ));
    }
}
