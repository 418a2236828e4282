// ==========================================
// 孵化机产能分配系统 - 占用索引
// ==========================================
// 职责: (机器, 槽位, 日期) → 占用的鸡群/批次
// 实现: 每个 (机器, 槽位) 维护按 occupied_from 排序的区间列表，二分查找
// 说明: 写入量低且窗口固定 21 天，排序区间扫描足够，无需区间树
// ==========================================

use crate::domain::allocation::{Occupant, OccupancyRecord};
use crate::domain::batch::DateRange;
use crate::domain::position::SlotKey;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};

// ==========================================
// OccupancyIndex - 只读占用索引
// ==========================================
#[derive(Debug, Default, Clone)]
pub struct OccupancyIndex {
    machines: HashMap<String, BTreeMap<SlotKey, Vec<OccupancyRecord>>>,
}

impl OccupancyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// 由占用记录构建索引
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = OccupancyRecord>,
    {
        let mut index = Self::new();
        for record in records {
            index.insert(record);
        }
        index
    }

    /// 插入一条记录并保持区间有序
    pub fn insert(&mut self, record: OccupancyRecord) {
        let intervals = self
            .machines
            .entry(record.machine_id.clone())
            .or_default()
            .entry(record.slot)
            .or_default();
        let at = intervals.partition_point(|r| r.occupied_from <= record.occupied_from);
        intervals.insert(at, record);
    }

    pub fn len(&self) -> usize {
        self.machines
            .values()
            .flat_map(|slots| slots.values())
            .map(Vec::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn intervals(&self, machine_id: &str, slot: &SlotKey) -> &[OccupancyRecord] {
        self.machines
            .get(machine_id)
            .and_then(|slots| slots.get(slot))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// 查询某槽位某日的占用者
    pub fn resolve(&self, machine_id: &str, slot: &SlotKey, on_date: NaiveDate) -> Option<Occupant> {
        self.record_on(machine_id, slot, on_date)
            .map(OccupancyRecord::occupant)
    }

    /// 查询某槽位某日的占用记录
    pub fn record_on(
        &self,
        machine_id: &str,
        slot: &SlotKey,
        on_date: NaiveDate,
    ) -> Option<&OccupancyRecord> {
        let intervals = self.intervals(machine_id, slot);
        // 同一槽位区间互不重叠: 起点 <= on_date 的最后一条是唯一候选
        let idx = intervals.partition_point(|r| r.occupied_from <= on_date);
        if idx == 0 {
            return None;
        }
        let candidate = &intervals[idx - 1];
        candidate.covers(on_date).then_some(candidate)
    }

    /// 某槽位与区间重叠的第一条记录
    pub fn find_overlap(
        &self,
        machine_id: &str,
        slot: &SlotKey,
        range: &DateRange,
    ) -> Option<&OccupancyRecord> {
        let intervals = self.intervals(machine_id, slot);
        let upto = intervals.partition_point(|r| r.occupied_from < range.end);
        intervals[..upto]
            .iter()
            .find(|r| r.occupied_to > range.start)
    }

    /// 机器上与区间重叠的全部记录
    pub fn overlapping(&self, machine_id: &str, range: &DateRange) -> Vec<&OccupancyRecord> {
        let Some(slots) = self.machines.get(machine_id) else {
            return Vec::new();
        };
        let (start, end) = (range.start, range.end);
        slots
            .values()
            .flat_map(move |intervals| {
                let upto = intervals.partition_point(|r| r.occupied_from < end);
                intervals[..upto].iter().filter(move |r| r.occupied_to > start)
            })
            .collect()
    }

    /// 机器在某日的全部占用记录（按槽位规范顺序）
    pub fn occupants_on(&self, machine_id: &str, on_date: NaiveDate) -> Vec<&OccupancyRecord> {
        let Some(slots) = self.machines.get(machine_id) else {
            return Vec::new();
        };
        slots
            .keys()
            .filter_map(|slot| self.record_on(machine_id, slot, on_date))
            .collect()
    }
}
