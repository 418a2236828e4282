// ==========================================
// 孵化机产能分配系统 - 分配写入校验
// ==========================================
// 职责: 账本写入前的不变量校验（按顺序，任一失败即整体拒绝）
// (a) eggs > 0
// (b) eggs <= 区间内可用产能（写入时重新计算，不信任规划结果）
// (c) 多段机: 所选位置容量 >= eggs
// (d) 所选位置在区间内无重叠占用
// ==========================================

use crate::domain::batch::DateRange;
use crate::domain::machine::Machine;
use crate::domain::position::{Position, SlotKey};
use crate::domain::types::MachineMode;
use crate::engine::capacity_resolver::MachineCapacityResolver;
use crate::engine::error::{AllocationError, AllocationResult};
use crate::engine::occupancy_index::OccupancyIndex;
use crate::engine::position_catalog::PositionCatalog;
use std::collections::HashSet;

/// 分配请求
#[derive(Debug, Clone)]
pub struct AllocationRequest<'a> {
    pub machine: &'a Machine,
    pub eggs: i64,
    pub positions: &'a [Position],
    pub date_range: DateRange,
}

// ==========================================
// AllocationValidator - 写入校验器（无状态）
// ==========================================
pub struct AllocationValidator {
    resolver: MachineCapacityResolver,
}

impl AllocationValidator {
    pub fn new() -> Self {
        Self {
            resolver: MachineCapacityResolver::new(),
        }
    }

    /// 校验请求并返回需要写入的占用槽
    pub fn validate(
        &self,
        request: &AllocationRequest<'_>,
        index: &OccupancyIndex,
    ) -> AllocationResult<Vec<SlotKey>> {
        let machine = request.machine;

        // (a) 蛋数
        if request.eggs <= 0 {
            return Err(AllocationError::Validation(format!(
                "分配蛋数必须大于0: {}",
                request.eggs
            )));
        }

        // 位置参数与机器模式一致
        match machine.mode {
            MachineMode::Single if !request.positions.is_empty() => {
                return Err(AllocationError::Validation(format!(
                    "单机模式机器{}不接受位置参数",
                    machine.machine_id
                )));
            }
            MachineMode::Multi if request.positions.is_empty() => {
                return Err(AllocationError::Validation(format!(
                    "多段机{}必须指定位置",
                    machine.machine_id
                )));
            }
            _ => {}
        }
        let mut seen = HashSet::new();
        for p in request.positions {
            if !seen.insert(*p) {
                return Err(AllocationError::Validation(format!("位置重复: {}", p)));
            }
        }

        // (b) 写入时可用产能
        // 单机模式的可用产能为 0 只可能源于区间重叠，按冲突上报
        if machine.mode == MachineMode::Single {
            if let Some(existing) = index.find_overlap(&machine.machine_id, &SlotKey::Whole, &request.date_range) {
                return Err(AllocationError::AllocationConflict {
                    machine_id: machine.machine_id.clone(),
                    slot: SlotKey::Whole.key(),
                    message: format!(
                        "整机已被批次{}占用 [{}, {})",
                        existing.batch_id, existing.occupied_from, existing.occupied_to
                    ),
                });
            }
        }
        let info = self.resolver.available(machine, &request.date_range, index);
        if request.eggs > info.available_capacity {
            return Err(AllocationError::InsufficientCapacity {
                requested: request.eggs,
                available: info.available_capacity,
            });
        }

        // (c) 所选位置装得下
        if machine.mode == MachineMode::Multi {
            let selected_capacity = PositionCatalog::capacity_of(machine.capacity_eggs, request.positions);
            if selected_capacity < request.eggs {
                let needed = PositionCatalog::positions_needed(request.eggs, machine.capacity_eggs);
                return Err(AllocationError::Validation(format!(
                    "位置数不足: eggs={}, selected={}, selected_capacity={}, needed={}",
                    request.eggs,
                    request.positions.len(),
                    selected_capacity,
                    needed.map(|n| n.to_string()).unwrap_or_else(|| "N/A".to_string())
                )));
            }
        }

        // (d) 所选槽位无重叠
        let slots: Vec<SlotKey> = match machine.mode {
            MachineMode::Single => vec![SlotKey::Whole],
            MachineMode::Multi => request.positions.iter().copied().map(SlotKey::Position).collect(),
        };
        for slot in &slots {
            if let Some(existing) = index.find_overlap(&machine.machine_id, slot, &request.date_range) {
                return Err(AllocationError::AllocationConflict {
                    machine_id: machine.machine_id.clone(),
                    slot: slot.key(),
                    message: format!(
                        "已被批次{}占用 [{}, {})",
                        existing.batch_id, existing.occupied_from, existing.occupied_to
                    ),
                });
            }
        }

        Ok(slots)
    }
}

impl Default for AllocationValidator {
    fn default() -> Self {
        Self::new()
    }
}
