// ==========================================
// 孵化机产能分配系统 - QA 读数追溯引擎
// ==========================================
// 职责: 将机器层面的 QA 读数追溯到读数日的鸡群/批次
// 规则:
// 1) 逐位读数: 18 个位置逐一查占用，空位置输出空追溯（读数保留作设备诊断）
// 2) 整机读数: 当日占用本机的 (鸡群, 批次) 去重后各输出一条 machine_wide 追溯
// 3) 整机读数当日无占用: 不输出追溯，只告警，不报错
// ==========================================

use crate::domain::machine::Machine;
use crate::domain::position::Position;
use crate::domain::qa::{
    Attribution, AttributionWarning, LinkageTarget, PositionLinkage, QaReading, QaValues,
};
use crate::domain::types::LinkageType;
use crate::engine::error::{AllocationError, AllocationResult};
use crate::engine::occupancy_index::OccupancyIndex;
use crate::engine::position_catalog::PositionCatalog;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

// ==========================================
// QaReadingResolver - 读数追溯
// ==========================================
pub struct QaReadingResolver {
    log_unattributed: bool,
}

impl QaReadingResolver {
    pub fn new() -> Self {
        Self {
            log_unattributed: true,
        }
    }

    /// 是否将无法追溯的读数写入 warn 日志（告警仍会随结果返回）
    pub fn with_unattributed_logging(mut self, enabled: bool) -> Self {
        self.log_unattributed = enabled;
        self
    }

    /// 追溯读数
    ///
    /// # 错误
    /// - Validation: 读数机器与传入机器不一致，或读数值非有限数
    #[instrument(skip(self, machine, reading, index), fields(
        reading_id = %reading.reading_id,
        machine_id = %reading.machine_id,
        check_date = %reading.check_date
    ))]
    pub fn attribute(
        &self,
        machine: &Machine,
        reading: &QaReading,
        index: &OccupancyIndex,
    ) -> AllocationResult<Attribution> {
        if reading.machine_id != machine.machine_id {
            return Err(AllocationError::Validation(format!(
                "读数机器不一致: reading={}, machine={}",
                reading.machine_id, machine.machine_id
            )));
        }

        match &reading.values {
            QaValues::PerPosition(values) => {
                if let Some((p, v)) = values.iter().find(|(_, v)| !v.is_finite()) {
                    return Err(AllocationError::Validation(format!(
                        "位置{}读数无效: {}",
                        p, v
                    )));
                }
                Ok(self.attribute_per_position(machine, reading, values, index))
            }
            QaValues::MachineWide(value) => {
                if !value.is_finite() {
                    return Err(AllocationError::Validation(format!("整机读数无效: {}", value)));
                }
                Ok(self.attribute_machine_wide(machine, reading, *value, index))
            }
        }
    }

    fn attribute_per_position(
        &self,
        machine: &Machine,
        reading: &QaReading,
        values: &BTreeMap<Position, f64>,
        index: &OccupancyIndex,
    ) -> Attribution {
        let mut linkages = Vec::with_capacity(PositionCatalog::all_positions().len());
        let mut unoccupied = 0usize;

        for position in PositionCatalog::all_positions() {
            let slot = machine.slot_for(position);
            let occupant = index.resolve(&machine.machine_id, &slot, reading.check_date);
            if occupant.is_none() {
                unoccupied += 1;
            }
            linkages.push(PositionLinkage {
                linkage_id: Uuid::new_v4().to_string(),
                reading_id: reading.reading_id.clone(),
                target: LinkageTarget::Position(position),
                linkage_type: LinkageType::PerPosition,
                resolved_flock_id: occupant.as_ref().map(|o| o.flock_id.clone()),
                resolved_batch_id: occupant.map(|o| o.batch_id),
                value: values.get(&position).copied(),
            });
        }

        let mut warnings = Vec::new();
        if unoccupied == linkages.len() {
            self.warn_no_occupant(reading);
            warnings.push(AttributionWarning::NoOccupant {
                machine_id: reading.machine_id.clone(),
                check_date: reading.check_date,
            });
        } else if unoccupied > 0 {
            debug!(unoccupied, "逐位读数包含空位置");
            warnings.push(AttributionWarning::UnoccupiedPositions { count: unoccupied });
        }

        Attribution {
            reading_id: reading.reading_id.clone(),
            linkages,
            warnings,
        }
    }

    fn attribute_machine_wide(
        &self,
        machine: &Machine,
        reading: &QaReading,
        value: f64,
        index: &OccupancyIndex,
    ) -> Attribution {
        // 同一鸡群占多个位置只算一次
        let occupants: BTreeSet<(String, String)> = index
            .occupants_on(&machine.machine_id, reading.check_date)
            .into_iter()
            .map(|r| (r.flock_id.clone(), r.batch_id.clone()))
            .collect();

        let linkages: Vec<PositionLinkage> = occupants
            .into_iter()
            .map(|(flock_id, batch_id)| PositionLinkage {
                linkage_id: Uuid::new_v4().to_string(),
                reading_id: reading.reading_id.clone(),
                target: LinkageTarget::MachineWide,
                linkage_type: LinkageType::MachineWide,
                resolved_flock_id: Some(flock_id),
                resolved_batch_id: Some(batch_id),
                value: Some(value),
            })
            .collect();

        let mut warnings = Vec::new();
        if linkages.is_empty() {
            self.warn_no_occupant(reading);
            warnings.push(AttributionWarning::NoOccupant {
                machine_id: reading.machine_id.clone(),
                check_date: reading.check_date,
            });
        }

        Attribution {
            reading_id: reading.reading_id.clone(),
            linkages,
            warnings,
        }
    }

    fn warn_no_occupant(&self, reading: &QaReading) {
        if self.log_unattributed {
            warn!(
                machine_id = %reading.machine_id,
                check_date = %reading.check_date,
                metric = %reading.metric,
                "读数当日机器无占用，无法追溯鸡群"
            );
        }
    }
}

impl Default for QaReadingResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::allocation::OccupancyRecord;
    use crate::domain::position::SlotKey;
    use crate::domain::types::{Level, MachineMode, QaMetric, Side, Zone};
    use chrono::NaiveDate;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 7, day).unwrap()
    }

    fn record(machine: &str, slot: SlotKey, batch: &str, flock: &str) -> OccupancyRecord {
        OccupancyRecord {
            allocation_id: format!("AL-{}", batch),
            machine_id: machine.to_string(),
            slot,
            batch_id: batch.to_string(),
            flock_id: flock.to_string(),
            occupied_from: d(1),
            occupied_to: d(22),
        }
    }

    #[test]
    fn test_per_position_reading_resolves_each_position() {
        let machine = Machine::new("M1", 18000, MachineMode::Multi);
        let all = PositionCatalog::all_positions();
        let index = OccupancyIndex::from_records(vec![record("M1", SlotKey::Position(all[0]), "B1", "F1")]);

        let mut values = BTreeMap::new();
        values.insert(all[0], 37.5);
        values.insert(all[1], 37.9);
        let reading = QaReading::per_position("M1", d(10), QaMetric::Temperature, values);

        let attribution = QaReadingResolver::new().attribute(&machine, &reading, &index).unwrap();
        assert_eq!(attribution.linkages.len(), 18);

        let first = &attribution.linkages[0];
        assert_eq!(first.target.key(), "A-Left-Top");
        assert_eq!(first.resolved_batch_id.as_deref(), Some("B1"));
        assert_eq!(first.value, Some(37.5));

        let second = &attribution.linkages[1];
        assert!(second.resolved_batch_id.is_none());
        assert_eq!(second.value, Some(37.9));
        assert_eq!(
            attribution.warnings,
            vec![AttributionWarning::UnoccupiedPositions { count: 17 }]
        );
    }

    #[test]
    fn test_machine_wide_reading_fans_out_to_distinct_flocks() {
        let machine = Machine::new("M1", 18000, MachineMode::Multi);
        let all = PositionCatalog::all_positions();
        let index = OccupancyIndex::from_records(vec![
            record("M1", SlotKey::Position(all[0]), "B1", "F1"),
            record("M1", SlotKey::Position(all[1]), "B1", "F1"),
            record("M1", SlotKey::Position(all[2]), "B1", "F1"),
            record("M1", SlotKey::Position(all[6]), "B2", "F2"),
            record("M1", SlotKey::Position(all[12]), "B3", "F3"),
        ]);

        let reading = QaReading::machine_wide("M1", d(10), QaMetric::Humidity, 55.0);
        let attribution = QaReadingResolver::new().attribute(&machine, &reading, &index).unwrap();

        assert_eq!(attribution.linkages.len(), 3);
        assert!(attribution
            .linkages
            .iter()
            .all(|l| l.linkage_type == LinkageType::MachineWide && l.target == LinkageTarget::MachineWide));
        assert_eq!(attribution.distinct_flocks(), vec!["F1", "F2", "F3"]);
        assert!(attribution.warnings.is_empty());
    }

    #[test]
    fn test_empty_machine_paths() {
        let machine = Machine::new("M1", 18000, MachineMode::Multi);
        let index = OccupancyIndex::new();
        let resolver = QaReadingResolver::new().with_unattributed_logging(false);

        let per_position = QaReading::per_position("M1", d(10), QaMetric::Temperature, BTreeMap::new());
        let attribution = resolver.attribute(&machine, &per_position, &index).unwrap();
        assert_eq!(attribution.linkages.len(), 18);
        assert!(attribution.linkages.iter().all(|l| !l.is_attributed()));
        assert!(matches!(attribution.warnings[0], AttributionWarning::NoOccupant { .. }));

        let wide = QaReading::machine_wide("M1", d(10), QaMetric::Angle, 45.0);
        let attribution = resolver.attribute(&machine, &wide, &index).unwrap();
        assert!(attribution.linkages.is_empty());
        assert_eq!(attribution.warnings.len(), 1);
    }

    #[test]
    fn test_single_mode_positions_resolve_to_whole_machine() {
        let machine = Machine::new("S1", 45000, MachineMode::Single);
        let index = OccupancyIndex::from_records(vec![record("S1", SlotKey::Whole, "BX", "FX")]);
        let reading = QaReading::per_position("S1", d(5), QaMetric::Temperature, BTreeMap::new());

        let attribution = QaReadingResolver::new().attribute(&machine, &reading, &index).unwrap();
        assert_eq!(attribution.linkages.len(), 18);
        assert!(attribution
            .linkages
            .iter()
            .all(|l| l.resolved_batch_id.as_deref() == Some("BX")));
    }

    #[test]
    fn test_rejects_mismatched_machine_and_nan() {
        let machine = Machine::new("M1", 18000, MachineMode::Multi);
        let index = OccupancyIndex::new();

        let other = QaReading::machine_wide("M2", d(5), QaMetric::Humidity, 50.0);
        assert!(matches!(
            QaReadingResolver::new().attribute(&machine, &other, &index),
            Err(AllocationError::Validation(_))
        ));

        let nan = QaReading::machine_wide("M1", d(5), QaMetric::Humidity, f64::NAN);
        assert!(QaReadingResolver::new().attribute(&machine, &nan, &index).is_err());

        let mut values = BTreeMap::new();
        values.insert(Position::new(Zone::A, Side::Left, Level::Top), f64::INFINITY);
        let bad = QaReading::per_position("M1", d(5), QaMetric::Temperature, values);
        assert!(QaReadingResolver::new().attribute(&machine, &bad, &index).is_err());
    }
}
