// ==========================================
// 孵化机产能分配系统 - 位置目录
// ==========================================
// 职责: 多段机 18 个位置的固定网格 + 每位置容量计算
// 规则: 余数蛋位按规范顺序逐个分给前 (capacity % 18) 个位置
//       全部位置容量之和严格等于整机容量
// ==========================================

use crate::domain::position::Position;
use crate::domain::types::{Level, Side, Zone};

/// 多段机位置数 (3 区 × 2 侧 × 3 层)
pub const POSITION_COUNT: usize = 18;

// ==========================================
// PositionCatalog - 位置目录（无状态）
// ==========================================
pub struct PositionCatalog;

impl PositionCatalog {
    /// 规范顺序下的全部 18 个位置
    pub fn all_positions() -> [Position; POSITION_COUNT] {
        let mut out = [Position::new(Zone::A, Side::Left, Level::Top); POSITION_COUNT];
        let mut i = 0;
        for zone in Zone::ALL {
            for side in Side::ALL {
                for level in Level::ALL {
                    out[i] = Position::new(zone, side, level);
                    i += 1;
                }
            }
        }
        out
    }

    /// 每位置基础容量 = floor(capacity / 18)
    pub fn capacity_per_position(machine_capacity: i64) -> i64 {
        machine_capacity.max(0) / POSITION_COUNT as i64
    }

    /// 余数蛋位数
    pub fn remainder(machine_capacity: i64) -> i64 {
        machine_capacity.max(0) % POSITION_COUNT as i64
    }

    /// 单个位置的实际容量（含余数分配）
    pub fn slot_capacity(machine_capacity: i64, position: Position) -> i64 {
        let base = Self::capacity_per_position(machine_capacity);
        if (position.index() as i64) < Self::remainder(machine_capacity) {
            base + 1
        } else {
            base
        }
    }

    /// 一组位置的容量之和
    pub fn capacity_of(machine_capacity: i64, positions: &[Position]) -> i64 {
        positions
            .iter()
            .map(|p| Self::slot_capacity(machine_capacity, *p))
            .sum()
    }

    /// 装下 eggs 所需的位置数 = ceil(eggs / capacity_per_position)
    ///
    /// 基础容量为 0 时返回 None（机器容量小于 18，无法分段装载）
    pub fn positions_needed(eggs: i64, machine_capacity: i64) -> Option<usize> {
        let per = Self::capacity_per_position(machine_capacity);
        if per <= 0 {
            return None;
        }
        if eggs <= 0 {
            return Some(0);
        }
        Some(((eggs + per - 1) / per) as usize)
    }

    /// 从候选位置中按规范顺序挑选，直到容量覆盖 eggs
    ///
    /// 候选不足时返回 None
    pub fn pick_positions(
        eggs: i64,
        machine_capacity: i64,
        candidates: &[Position],
    ) -> Option<Vec<Position>> {
        let mut sorted = candidates.to_vec();
        sorted.sort();
        sorted.dedup();

        let mut picked = Vec::new();
        let mut covered = 0;
        for p in sorted {
            if covered >= eggs {
                break;
            }
            covered += Self::slot_capacity(machine_capacity, p);
            picked.push(p);
        }
        if covered >= eggs {
            Some(picked)
        } else {
            None
        }
    }
}
