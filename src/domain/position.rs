// ==========================================
// 孵化机产能分配系统 - 位置与占用槽领域模型
// ==========================================
// 红线: 位置键只由 Position 的规范函数生成，禁止自由拼接字符串
// ==========================================

use crate::domain::types::{Level, Side, Zone};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 整机占用槽的存储键（单机模式）
pub const WHOLE_MACHINE_KEY: &str = "WHOLE";

/// 机器级追溯的哨兵键
pub const MACHINE_WIDE_KEY: &str = "machine_wide";

// ==========================================
// Position - 多段机内的物理位置
// ==========================================
// 排序即规范顺序: 区 → 侧 → 层
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Position {
    pub zone: Zone,
    pub side: Side,
    pub level: Level,
}

impl Position {
    pub const fn new(zone: Zone, side: Side, level: Level) -> Self {
        Self { zone, side, level }
    }

    /// 规范位置键，如 `A-Left-Top`
    pub fn key(&self) -> String {
        format!("{}-{}-{}", self.zone, self.side, self.level)
    }

    /// 规范顺序下的序号 (0..18)
    pub fn index(&self) -> usize {
        (self.zone as usize) * 6 + (self.side as usize) * 3 + (self.level as usize)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.zone, self.side, self.level)
    }
}

impl FromStr for Position {
    type Err = String;

    /// 解析位置键，接受 `A-Left-Top` / `a-left-top` / `A-L-T`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('-').collect();
        if parts.len() != 3 {
            return Err(format!("无效位置键: {}", s));
        }
        let zone = parts[0].parse::<Zone>().map_err(|e| format!("无效位置键 {}: {}", s, e))?;
        let side = parts[1].parse::<Side>().map_err(|e| format!("无效位置键 {}: {}", s, e))?;
        let level = parts[2].parse::<Level>().map_err(|e| format!("无效位置键 {}: {}", s, e))?;
        Ok(Position::new(zone, side, level))
    }
}

impl From<Position> for String {
    fn from(p: Position) -> Self {
        p.key()
    }
}

impl TryFrom<String> for Position {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

// ==========================================
// SlotKey - 占用记录的占用单元
// ==========================================
// 单机模式: Whole
// 多段模式: Position
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SlotKey {
    Whole,
    Position(Position),
}

impl SlotKey {
    pub fn key(&self) -> String {
        match self {
            SlotKey::Whole => WHOLE_MACHINE_KEY.to_string(),
            SlotKey::Position(p) => p.key(),
        }
    }

    pub fn position(&self) -> Option<Position> {
        match self {
            SlotKey::Whole => None,
            SlotKey::Position(p) => Some(*p),
        }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotKey::Whole => f.write_str(WHOLE_MACHINE_KEY),
            SlotKey::Position(p) => p.fmt(f),
        }
    }
}

impl FromStr for SlotKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case(WHOLE_MACHINE_KEY) {
            return Ok(SlotKey::Whole);
        }
        s.parse::<Position>().map(SlotKey::Position)
    }
}

impl From<Position> for SlotKey {
    fn from(p: Position) -> Self {
        SlotKey::Position(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_key_is_canonical() {
        let p = Position::new(Zone::A, Side::Left, Level::Top);
        assert_eq!(p.key(), "A-Left-Top");
        assert_eq!(p.index(), 0);

        let last = Position::new(Zone::C, Side::Right, Level::Bottom);
        assert_eq!(last.key(), "C-Right-Bottom");
        assert_eq!(last.index(), 17);
    }

    #[test]
    fn test_position_parse_accepts_short_and_mixed_case() {
        let p: Position = "b-r-m".parse().unwrap();
        assert_eq!(p, Position::new(Zone::B, Side::Right, Level::Middle));
        assert_eq!("B-Right-Middle".parse::<Position>().unwrap(), p);
    }

    #[test]
    fn test_position_parse_rejects_unknown_key() {
        assert!("D-Left-Top".parse::<Position>().is_err());
        assert!("A-Left".parse::<Position>().is_err());
        assert!("A-Up-Top".parse::<Position>().is_err());
    }

    #[test]
    fn test_position_serializes_as_key_string() {
        let p = Position::new(Zone::A, Side::Right, Level::Bottom);
        assert_eq!(serde_json::to_string(&p).unwrap(), "\"A-Right-Bottom\"");
        let back: Position = serde_json::from_str("\"A-Right-Bottom\"").unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn test_slot_key_whole_and_position() {
        assert_eq!("WHOLE".parse::<SlotKey>().unwrap(), SlotKey::Whole);
        let slot: SlotKey = "C-Left-Bottom".parse().unwrap();
        assert_eq!(slot.key(), "C-Left-Bottom");
        assert!(slot.position().is_some());
        assert!(SlotKey::Whole.position().is_none());
    }
}
