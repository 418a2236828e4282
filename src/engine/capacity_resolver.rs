// ==========================================
// 孵化机产能分配系统 - 机器可用产能计算
// ==========================================
// 职责: 给定机器 + 候选日期区间，计算可用蛋位与空闲/占用位置
// 红线: 单机模式不可拆分，任何重叠即可用容量为 0
// 说明: 纯计算，无副作用，可并发重复调用
// ==========================================

use crate::domain::batch::DateRange;
use crate::domain::machine::Machine;
use crate::domain::position::{Position, SlotKey};
use crate::domain::types::MachineMode;
use crate::engine::occupancy_index::OccupancyIndex;
use crate::engine::position_catalog::PositionCatalog;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::instrument;

/// 可用产能查询结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityInfo {
    pub machine_id: String,
    pub mode: MachineMode,
    pub machine_capacity: i64,
    pub date_range: DateRange,
    pub available_capacity: i64,
    pub available_positions: Vec<Position>, // 单机模式为空
    pub occupied_positions: Vec<Position>,  // 单机模式为空
}

impl CapacityInfo {
    pub fn is_fully_free(&self) -> bool {
        self.available_capacity == self.machine_capacity
    }
}

// ==========================================
// MachineCapacityResolver - 可用产能计算器
// ==========================================
pub struct MachineCapacityResolver {
    // 无状态引擎
}

impl MachineCapacityResolver {
    pub fn new() -> Self {
        Self {}
    }

    /// 计算机器在区间内的可用产能
    #[instrument(skip(self, machine, index), fields(machine_id = %machine.machine_id, range = %date_range))]
    pub fn available(
        &self,
        machine: &Machine,
        date_range: &DateRange,
        index: &OccupancyIndex,
    ) -> CapacityInfo {
        let overlapping = index.overlapping(&machine.machine_id, date_range);

        match machine.mode {
            MachineMode::Single => {
                let available_capacity = if overlapping.is_empty() {
                    machine.capacity_eggs
                } else {
                    0
                };
                CapacityInfo {
                    machine_id: machine.machine_id.clone(),
                    mode: machine.mode,
                    machine_capacity: machine.capacity_eggs,
                    date_range: *date_range,
                    available_capacity,
                    available_positions: Vec::new(),
                    occupied_positions: Vec::new(),
                }
            }
            MachineMode::Multi => {
                let occupied: BTreeSet<Position> = overlapping
                    .iter()
                    .filter_map(|r| match r.slot {
                        SlotKey::Position(p) => Some(p),
                        // 多段机上不应出现整机槽；若出现则视为全部占用
                        SlotKey::Whole => None,
                    })
                    .collect();
                let whole_blocked = overlapping.iter().any(|r| r.slot == SlotKey::Whole);

                let all = PositionCatalog::all_positions();
                let (available_positions, occupied_positions): (Vec<Position>, Vec<Position>) =
                    if whole_blocked {
                        (Vec::new(), all.to_vec())
                    } else {
                        all.iter().copied().partition(|p| !occupied.contains(p))
                    };

                let available_capacity =
                    PositionCatalog::capacity_of(machine.capacity_eggs, &available_positions);

                CapacityInfo {
                    machine_id: machine.machine_id.clone(),
                    mode: machine.mode,
                    machine_capacity: machine.capacity_eggs,
                    date_range: *date_range,
                    available_capacity,
                    available_positions,
                    occupied_positions,
                }
            }
        }
    }
}

impl Default for MachineCapacityResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::allocation::OccupancyRecord;
    use chrono::NaiveDate;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, day).unwrap()
    }

    fn record(machine: &str, slot: SlotKey, from: u32, to: u32) -> OccupancyRecord {
        OccupancyRecord {
            allocation_id: "AL1".to_string(),
            machine_id: machine.to_string(),
            slot,
            batch_id: "B1".to_string(),
            flock_id: "F1".to_string(),
            occupied_from: d(from),
            occupied_to: d(to),
        }
    }

    #[test]
    fn test_single_mode_is_all_or_nothing() {
        let resolver = MachineCapacityResolver::new();
        let machine = Machine::new("S1", 45000, MachineMode::Single);
        let index = OccupancyIndex::from_records(vec![record("S1", SlotKey::Whole, 1, 22)]);

        let busy = resolver.available(&machine, &DateRange::new(d(21), d(28)).unwrap(), &index);
        assert_eq!(busy.available_capacity, 0);

        let free = resolver.available(&machine, &DateRange::new(d(22), d(30)).unwrap(), &index);
        assert_eq!(free.available_capacity, 45000);
        assert!(free.is_fully_free());
    }

    #[test]
    fn test_multi_mode_subtracts_occupied_positions() {
        let resolver = MachineCapacityResolver::new();
        let machine = Machine::new("M1", 18000, MachineMode::Multi);
        let all = PositionCatalog::all_positions();
        let index = OccupancyIndex::from_records(vec![
            record("M1", SlotKey::Position(all[0]), 1, 22),
            record("M1", SlotKey::Position(all[5]), 1, 22),
            record("M1", SlotKey::Position(all[9]), 20, 28),
            record("M1", SlotKey::Position(all[11]), 23, 28),
        ]);

        let info = resolver.available(&machine, &DateRange::incubation(d(2)), &index);
        assert_eq!(info.occupied_positions, vec![all[0], all[5], all[9]]);
        assert_eq!(info.available_positions.len(), 15);
        assert_eq!(info.available_capacity, 15000);
        assert!(!info.available_positions.contains(&all[0]));
    }

    #[test]
    fn test_multi_mode_remainder_counts_exactly() {
        let resolver = MachineCapacityResolver::new();
        let machine = Machine::new("M2", 18005, MachineMode::Multi);
        let all = PositionCatalog::all_positions();
        let index = OccupancyIndex::from_records(vec![record("M2", SlotKey::Position(all[0]), 1, 22)]);

        let info = resolver.available(&machine, &DateRange::incubation(d(1)), &index);
        // A-Left-Top 带余数 1001，剩余 = 18005 - 1001
        assert_eq!(info.available_capacity, 17004);
    }
}
