// ==========================================
// 产能查询与拆分建议测试
// ==========================================
// 职责: 验证可用产能、拆分建议与占用快照
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod capacity_planner_test {
    use hatchery_alloc::config::config_keys;
    use hatchery_alloc::domain::DateRange;
    use hatchery_alloc::engine::{AllocationStrategy, PositionCatalog};
    use hatchery_alloc::{ApiError, MachineMode};

    use crate::test_helpers::{add_batch, add_machine, create_test_state, d};

    #[test]
    fn test_remainder_positions_sum_to_capacity() {
        let (_tmp, state) = create_test_state();
        add_machine(&state, "M1", 18_005, MachineMode::Multi);

        let info = state
            .capacity_api
            .get_available_capacity("M1", DateRange::incubation(d(2, 1)))
            .unwrap();
        assert_eq!(info.available_capacity, 18_005);
        assert_eq!(info.available_positions.len(), 18);
    }

    #[test]
    fn test_plan_never_exceeds_availability_and_can_be_applied() {
        println!("\n=== 拆分建议: 按建议写入全部成功 ===");
        let (_tmp, state) = create_test_state();
        add_machine(&state, "M1", 18_000, MachineMode::Multi);
        add_machine(&state, "M2", 18_000, MachineMode::Multi);
        add_machine(&state, "S1", 10_000, MachineMode::Single);
        add_batch(&state, "B0", "F0", d(2, 1), 9_000);
        add_batch(&state, "B1", "F1", d(2, 3), 30_000);

        let all = PositionCatalog::all_positions();
        let ledger = &state.allocation_ledger;
        ledger
            .create_allocation("B0", "M1", 9_000, &all[..9], DateRange::incubation(d(2, 1)))
            .unwrap();

        let range = DateRange::incubation(d(2, 3));
        let machines = vec!["M1".to_string(), "M2".to_string(), "S1".to_string()];
        let plan = state.capacity_api.suggest_split(30_000, &machines, range).unwrap();
        assert_eq!(plan.strategy, AllocationStrategy::LargestFirst);
        assert_eq!(plan.planned_eggs(), 30_000);

        for line in &plan.lines {
            let info = state.capacity_api.get_available_capacity(&line.machine_id, range).unwrap();
            assert!(line.eggs <= info.available_capacity);
            ledger
                .create_allocation("B1", &line.machine_id, line.eggs, &line.suggested_positions, range)
                .unwrap();
        }
        ledger.confirm_batch("B1").unwrap();
        println!("✓ 拆分建议通过");
    }

    #[test]
    fn test_plan_insufficient_capacity() {
        let (_tmp, state) = create_test_state();
        add_machine(&state, "M1", 18_000, MachineMode::Multi);

        let err = state
            .capacity_api
            .suggest_split(20_000, &["M1".to_string()], DateRange::incubation(d(2, 1)))
            .unwrap_err();
        assert!(matches!(
            err,
            ApiError::InsufficientCapacity {
                requested: 20_000,
                available: 18_000
            }
        ));

        let err = state
            .capacity_api
            .suggest_split(100, &["M1".to_string(), "M1".to_string()], DateRange::incubation(d(2, 1)))
            .unwrap_err();
        assert!(matches!(err, ApiError::ValidationError(_)));
    }

    #[test]
    fn test_configured_strategy_is_used() {
        let (_tmp, state) = create_test_state();
        add_machine(&state, "BIG", 18_000, MachineMode::Multi);
        add_machine(&state, "SMALL", 5_000, MachineMode::Single);
        state
            .config_manager
            .set_global_config_value(config_keys::DEFAULT_STRATEGY, "fewest_fragments")
            .unwrap();

        let plan = state
            .capacity_api
            .suggest_split(
                4_000,
                &["BIG".to_string(), "SMALL".to_string()],
                DateRange::incubation(d(2, 1)),
            )
            .unwrap();
        assert_eq!(plan.strategy, AllocationStrategy::FewestFragments);
        assert_eq!(plan.lines.len(), 1);
        assert_eq!(plan.lines[0].machine_id, "SMALL");
    }

    #[test]
    fn test_resolve_occupant_and_snapshot() {
        let (_tmp, state) = create_test_state();
        add_machine(&state, "M1", 18_000, MachineMode::Multi);
        add_batch(&state, "B1", "F1", d(2, 1), 2_000);

        let all = PositionCatalog::all_positions();
        state
            .allocation_ledger
            .create_allocation("B1", "M1", 2_000, &all[16..18], DateRange::incubation(d(2, 1)))
            .unwrap();

        let capacity = &state.capacity_api;
        let occupant = capacity.resolve_occupant("M1", "C-Right-Bottom", d(2, 21)).unwrap();
        assert_eq!(occupant.unwrap().flock_id, "F1");
        assert!(capacity.resolve_occupant("M1", "C-Right-Bottom", d(2, 22)).unwrap().is_none());
        assert!(matches!(
            capacity.resolve_occupant("M1", "D-Left-Top", d(2, 5)),
            Err(ApiError::ValidationError(_))
        ));

        let snapshot = capacity.machine_occupancy("M1", d(2, 5)).unwrap();
        assert_eq!(snapshot.positions.len(), 18);
        assert_eq!(snapshot.occupied_count(), 2);
        assert_eq!(snapshot.batches(), vec!["B1".to_string()]);
    }
}
