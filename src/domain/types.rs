// ==========================================
// 孵化机产能分配系统 - 领域类型定义
// ==========================================
// 说明: 机器模式 / 位置坐标 / 批次状态 / QA 指标
// 序列化格式: 与数据库存储值一致
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// 机器模式 (Machine Mode)
// ==========================================
// SINGLE: 整机作为一个单元分配
// MULTI: 18 个位置独立装载 (multi-setter)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MachineMode {
    Single,
    Multi,
}

impl fmt::Display for MachineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MachineMode::Single => write!(f, "SINGLE"),
            MachineMode::Multi => write!(f, "MULTI"),
        }
    }
}

impl FromStr for MachineMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "SINGLE" => Ok(MachineMode::Single),
            "MULTI" => Ok(MachineMode::Multi),
            other => Err(format!("未知机器模式: {}", other)),
        }
    }
}

// ==========================================
// 位置坐标: 区 (Zone)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Zone {
    A,
    B,
    C,
}

impl Zone {
    pub const ALL: [Zone; 3] = [Zone::A, Zone::B, Zone::C];

    pub fn as_str(&self) -> &'static str {
        match self {
            Zone::A => "A",
            Zone::B => "B",
            Zone::C => "C",
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Zone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "A" => Ok(Zone::A),
            "B" => Ok(Zone::B),
            "C" => Ok(Zone::C),
            other => Err(format!("未知区: {}", other)),
        }
    }
}

// ==========================================
// 位置坐标: 侧 (Side)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub const ALL: [Side; 2] = [Side::Left, Side::Right];

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Left => "Left",
            Side::Right => "Right",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "left" | "l" => Ok(Side::Left),
            "right" | "r" => Ok(Side::Right),
            other => Err(format!("未知侧: {}", other)),
        }
    }
}

// ==========================================
// 位置坐标: 层 (Level)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Level {
    Top,
    Middle,
    Bottom,
}

impl Level {
    pub const ALL: [Level; 3] = [Level::Top, Level::Middle, Level::Bottom];

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Top => "Top",
            Level::Middle => "Middle",
            Level::Bottom => "Bottom",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "top" | "t" => Ok(Level::Top),
            "middle" | "mid" | "m" => Ok(Level::Middle),
            "bottom" | "b" => Ok(Level::Bottom),
            other => Err(format!("未知层: {}", other)),
        }
    }
}

// ==========================================
// 批次状态 (Batch Status)
// ==========================================
// DRAFT: 分配中，可增删分配
// CONFIRMED: 分配蛋数已与入孵总数对齐，不可再改
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
    Draft,
    Confirmed,
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchStatus::Draft => write!(f, "DRAFT"),
            BatchStatus::Confirmed => write!(f, "CONFIRMED"),
        }
    }
}

impl FromStr for BatchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "DRAFT" => Ok(BatchStatus::Draft),
            "CONFIRMED" => Ok(BatchStatus::Confirmed),
            other => Err(format!("未知批次状态: {}", other)),
        }
    }
}

// ==========================================
// QA 指标 (QA Metric)
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QaMetric {
    Temperature,
    Humidity,
    Angle,
    Other(String),
}

impl QaMetric {
    pub fn as_str(&self) -> &str {
        match self {
            QaMetric::Temperature => "temperature",
            QaMetric::Humidity => "humidity",
            QaMetric::Angle => "angle",
            QaMetric::Other(name) => name.as_str(),
        }
    }
}

impl fmt::Display for QaMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for QaMetric {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "temperature" | "temp" => QaMetric::Temperature,
            "humidity" => QaMetric::Humidity,
            "angle" => QaMetric::Angle,
            other => QaMetric::Other(other.to_string()),
        }
    }
}

// ==========================================
// 追溯类型 (Linkage Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkageType {
    PerPosition,
    MachineWide,
}

impl LinkageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkageType::PerPosition => "per_position",
            LinkageType::MachineWide => "machine_wide",
        }
    }
}

impl fmt::Display for LinkageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LinkageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "per_position" => Ok(LinkageType::PerPosition),
            "machine_wide" => Ok(LinkageType::MachineWide),
            other => Err(format!("未知追溯类型: {}", other)),
        }
    }
}
