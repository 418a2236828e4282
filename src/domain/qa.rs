// ==========================================
// 孵化机产能分配系统 - QA 读数与追溯领域模型
// ==========================================
// 说明: 读数在机器层面采集，追溯到读数日占用各位置的鸡群/批次
// 红线: 空位置的逐位读数照样保留（设备诊断用途）
// ==========================================

use crate::domain::position::{Position, MACHINE_WIDE_KEY};
use crate::domain::types::{LinkageType, QaMetric};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// QaValues - 读数载荷
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "values", rename_all = "snake_case")]
pub enum QaValues {
    /// 18 点逐位读数（温度图），缺测位置可不出现
    PerPosition(BTreeMap<Position, f64>),
    /// 整机读数（湿度/角度等）
    MachineWide(f64),
}

impl QaValues {
    pub fn linkage_type(&self) -> LinkageType {
        match self {
            QaValues::PerPosition(_) => LinkageType::PerPosition,
            QaValues::MachineWide(_) => LinkageType::MachineWide,
        }
    }
}

// ==========================================
// QaReading - QA 读数
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaReading {
    pub reading_id: String,
    pub machine_id: String,
    pub check_date: NaiveDate,
    pub metric: QaMetric,
    pub values: QaValues,
}

impl QaReading {
    pub fn per_position(
        machine_id: impl Into<String>,
        check_date: NaiveDate,
        metric: QaMetric,
        values: BTreeMap<Position, f64>,
    ) -> Self {
        Self {
            reading_id: uuid::Uuid::new_v4().to_string(),
            machine_id: machine_id.into(),
            check_date,
            metric,
            values: QaValues::PerPosition(values),
        }
    }

    pub fn machine_wide(
        machine_id: impl Into<String>,
        check_date: NaiveDate,
        metric: QaMetric,
        value: f64,
    ) -> Self {
        Self {
            reading_id: uuid::Uuid::new_v4().to_string(),
            machine_id: machine_id.into(),
            check_date,
            metric,
            values: QaValues::MachineWide(value),
        }
    }
}

// ==========================================
// LinkageTarget - 追溯目标（位置或机器级哨兵）
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkageTarget {
    Position(Position),
    MachineWide,
}

impl LinkageTarget {
    pub fn key(&self) -> String {
        match self {
            LinkageTarget::Position(p) => p.key(),
            LinkageTarget::MachineWide => MACHINE_WIDE_KEY.to_string(),
        }
    }

    pub fn position(&self) -> Option<Position> {
        match self {
            LinkageTarget::Position(p) => Some(*p),
            LinkageTarget::MachineWide => None,
        }
    }

    pub fn parse_key(key: &str) -> Result<Self, String> {
        if key.trim() == MACHINE_WIDE_KEY {
            return Ok(LinkageTarget::MachineWide);
        }
        key.parse::<Position>().map(LinkageTarget::Position)
    }
}

// ==========================================
// PositionLinkage - 读数追溯记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionLinkage {
    pub linkage_id: String,
    pub reading_id: String,
    pub target: LinkageTarget,
    pub linkage_type: LinkageType,
    pub resolved_flock_id: Option<String>,
    pub resolved_batch_id: Option<String>,
    pub value: Option<f64>,
}

impl PositionLinkage {
    pub fn is_attributed(&self) -> bool {
        self.resolved_batch_id.is_some()
    }
}

// ==========================================
// Attribution - 追溯结果
// ==========================================
/// 无法识别占用者时只告警，不报错
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributionWarning {
    /// 整机读数当日没有任何占用者
    NoOccupant { machine_id: String, check_date: NaiveDate },
    /// 逐位读数中有空位置（仍保留读数）
    UnoccupiedPositions { count: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribution {
    pub reading_id: String,
    pub linkages: Vec<PositionLinkage>,
    pub warnings: Vec<AttributionWarning>,
}

impl Attribution {
    /// 去重后的鸡群集合
    pub fn distinct_flocks(&self) -> Vec<String> {
        let mut flocks: Vec<String> = self
            .linkages
            .iter()
            .filter_map(|l| l.resolved_flock_id.clone())
            .collect();
        flocks.sort();
        flocks.dedup();
        flocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{Level, Side, Zone};

    #[test]
    fn test_per_position_values_json_uses_position_keys() {
        let mut values = BTreeMap::new();
        values.insert(Position::new(Zone::A, Side::Left, Level::Top), 37.6);
        let json = serde_json::to_value(QaValues::PerPosition(values.clone())).unwrap();
        assert_eq!(json["kind"], "per_position");
        assert_eq!(json["values"]["A-Left-Top"], 37.6);

        let back: QaValues = serde_json::from_value(json).unwrap();
        assert_eq!(back, QaValues::PerPosition(values));
    }

    #[test]
    fn test_linkage_target_sentinel() {
        assert_eq!(LinkageTarget::MachineWide.key(), "machine_wide");
        assert_eq!(
            LinkageTarget::parse_key("machine_wide").unwrap(),
            LinkageTarget::MachineWide
        );
        assert!(LinkageTarget::parse_key("WHOLE").is_err());
    }
}
