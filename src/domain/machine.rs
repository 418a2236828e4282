// ==========================================
// 孵化机产能分配系统 - 孵化机领域模型
// ==========================================

use crate::domain::position::{Position, SlotKey};
use crate::domain::types::MachineMode;
use serde::{Deserialize, Serialize};

// ==========================================
// Machine - 孵化机
// ==========================================
// 红线: 模式与 18 个位置在机器生命周期内固定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Machine {
    pub machine_id: String,
    pub machine_name: Option<String>,
    pub capacity_eggs: i64, // 整机容量（蛋数）
    pub mode: MachineMode,
}

impl Machine {
    pub fn new(machine_id: impl Into<String>, capacity_eggs: i64, mode: MachineMode) -> Self {
        Self {
            machine_id: machine_id.into(),
            machine_name: None,
            capacity_eggs,
            mode,
        }
    }

    pub fn is_multi(&self) -> bool {
        self.mode == MachineMode::Multi
    }

    /// 位置在本机上对应的占用槽
    ///
    /// 单机模式下任意位置都映射到整机槽
    pub fn slot_for(&self, position: Position) -> SlotKey {
        match self.mode {
            MachineMode::Single => SlotKey::Whole,
            MachineMode::Multi => SlotKey::Position(position),
        }
    }
}
