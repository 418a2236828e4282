// ==========================================
// 孵化机产能分配系统 - 批次与日期区间领域模型
// ==========================================
// 说明: 批次由外部批次/鸡群生命周期服务提供，这里只保存分配所需字段
// ==========================================

use crate::domain::types::BatchStatus;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 固定孵化周期（天）
pub const INCUBATION_DAYS: i64 = 21;

/// 入孵机阶段结束日（第 18 天转出到出雏机）
pub const SETTER_DAYS: i64 = 18;

// ==========================================
// DateRange - 半开日期区间 [start, end)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// 创建区间，要求 start < end
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, String> {
        if start >= end {
            return Err(format!("无效日期区间: [{}, {})", start, end));
        }
        Ok(Self { start, end })
    }

    /// 入孵日起算的完整孵化窗口 [set_date, set_date + 21d)
    pub fn incubation(set_date: NaiveDate) -> Self {
        Self {
            start: set_date,
            end: set_date + Duration::days(INCUBATION_DAYS),
        }
    }

    /// 单日区间 [date, date + 1d)
    pub fn single_day(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date + Duration::days(1),
        }
    }

    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

// ==========================================
// Batch - 入孵批次
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    pub batch_id: String,
    pub flock_id: String,
    pub set_date: NaiveDate,
    pub total_eggs_set: i64,
    pub status: BatchStatus,
}

impl Batch {
    pub fn new(batch_id: impl Into<String>, flock_id: impl Into<String>, set_date: NaiveDate, total_eggs_set: i64) -> Self {
        Self {
            batch_id: batch_id.into(),
            flock_id: flock_id.into(),
            set_date,
            total_eggs_set,
            status: BatchStatus::Draft,
        }
    }

    /// 预计出雏日 = 入孵日 + 21 天
    pub fn completion_date(&self) -> NaiveDate {
        self.set_date + Duration::days(INCUBATION_DAYS)
    }

    /// 落盘日 = 入孵日 + 18 天（转入出雏机）
    pub fn hatcher_transfer_date(&self) -> NaiveDate {
        self.set_date + Duration::days(SETTER_DAYS)
    }

    pub fn incubation_range(&self) -> DateRange {
        DateRange::incubation(self.set_date)
    }

    pub fn is_confirmed(&self) -> bool {
        self.status == BatchStatus::Confirmed
    }
}
