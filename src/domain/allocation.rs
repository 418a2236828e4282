// ==========================================
// 孵化机产能分配系统 - 分配与占用领域模型
// ==========================================
// 红线: 占用记录只随分配一起创建/删除，不单独存在
// ==========================================

use crate::domain::batch::DateRange;
use crate::domain::position::{Position, SlotKey};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// Allocation - 批次在某台机器上的分配
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Allocation {
    pub allocation_id: String,
    pub batch_id: String,
    pub machine_id: String,
    pub eggs_allocated: i64,
    pub date_range: DateRange,
    pub positions: Vec<Position>, // 单机模式为空

    // ===== 转移链路 =====
    pub source_allocation_id: Option<String>, // 由哪条分配转入
    pub transferred_out_on: Option<NaiveDate>, // 提前转出日期

    pub created_at: NaiveDateTime,
}

impl Allocation {
    /// 未被转出的分配计入批次蛋数
    pub fn is_current(&self) -> bool {
        self.transferred_out_on.is_none()
    }

    /// 实际占用的区间（转出后截止于转出日）
    pub fn occupied_range(&self) -> DateRange {
        match self.transferred_out_on {
            Some(date) => DateRange {
                start: self.date_range.start,
                end: date,
            },
            None => self.date_range,
        }
    }

    /// 本分配占用的槽位
    pub fn slots(&self) -> Vec<SlotKey> {
        if self.positions.is_empty() {
            vec![SlotKey::Whole]
        } else {
            self.positions.iter().copied().map(SlotKey::Position).collect()
        }
    }

    /// 生成与分配同生共死的占用记录
    pub fn occupancy_records(&self, flock_id: &str) -> Vec<OccupancyRecord> {
        let range = self.occupied_range();
        self.slots()
            .into_iter()
            .map(|slot| OccupancyRecord {
                allocation_id: self.allocation_id.clone(),
                machine_id: self.machine_id.clone(),
                slot,
                batch_id: self.batch_id.clone(),
                flock_id: flock_id.to_string(),
                occupied_from: range.start,
                occupied_to: range.end,
            })
            .collect()
    }
}

// ==========================================
// OccupancyRecord - 占用记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccupancyRecord {
    pub allocation_id: String,
    pub machine_id: String,
    pub slot: SlotKey,
    pub batch_id: String,
    pub flock_id: String,
    pub occupied_from: NaiveDate,
    pub occupied_to: NaiveDate, // 不含
}

impl OccupancyRecord {
    pub fn range(&self) -> DateRange {
        DateRange {
            start: self.occupied_from,
            end: self.occupied_to,
        }
    }

    pub fn covers(&self, date: NaiveDate) -> bool {
        self.occupied_from <= date && date < self.occupied_to
    }

    pub fn occupant(&self) -> Occupant {
        Occupant {
            flock_id: self.flock_id.clone(),
            batch_id: self.batch_id.clone(),
            allocation_id: self.allocation_id.clone(),
        }
    }
}

/// 某槽位某日的占用者
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Occupant {
    pub flock_id: String,
    pub batch_id: String,
    pub allocation_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{Level, Side, Zone};

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, day).unwrap()
    }

    fn allocation(positions: Vec<Position>) -> Allocation {
        Allocation {
            allocation_id: "AL1".to_string(),
            batch_id: "B1".to_string(),
            machine_id: "M1".to_string(),
            eggs_allocated: 500,
            date_range: DateRange::incubation(d(1)),
            positions,
            source_allocation_id: None,
            transferred_out_on: None,
            created_at: d(1).and_hms_opt(8, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_single_mode_allocation_occupies_whole_slot() {
        let records = allocation(vec![]).occupancy_records("F1");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].slot, SlotKey::Whole);
        assert_eq!(records[0].occupied_to, d(22));
    }

    #[test]
    fn test_transferred_allocation_closes_at_transfer_date() {
        let mut alloc = allocation(vec![
            Position::new(Zone::A, Side::Left, Level::Top),
            Position::new(Zone::A, Side::Left, Level::Middle),
        ]);
        alloc.transferred_out_on = Some(d(19));

        assert!(!alloc.is_current());
        let records = alloc.occupancy_records("F1");
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.occupied_to == d(19)));
        assert!(records[0].covers(d(18)));
        assert!(!records[0].covers(d(19)));
    }
}
