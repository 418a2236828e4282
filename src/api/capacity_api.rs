// ==========================================
// 孵化机产能分配系统 - 产能查询 API
// ==========================================
// 职责: 可用产能查询、拆分建议、占用者查询、机器占用快照
// 说明: 只读，不加机器锁；结果仅供参考，写入时由账本重新校验
// ==========================================

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::api::error::{ApiError, ApiResult};
use crate::config::config_manager::ConfigManager;
use crate::domain::allocation::Occupant;
use crate::domain::batch::DateRange;
use crate::domain::machine::Machine;
use crate::domain::position::Position;
use crate::domain::types::MachineMode;
use crate::engine::capacity_resolver::{CapacityInfo, MachineCapacityResolver};
use crate::engine::occupancy_index::OccupancyIndex;
use crate::engine::planner::{AllocationPlan, AllocationStrategy};
use crate::engine::position_catalog::PositionCatalog;
use crate::repository::allocation_repo::AllocationRepository;
use crate::repository::machine_repo::MachineRepository;

/// 单个位置在某日的占用情况
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionOccupancy {
    pub position: Position,
    pub occupant: Option<Occupant>,
}

/// 机器在某日的占用快照（看板展示用）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineOccupancy {
    pub machine_id: String,
    pub mode: MachineMode,
    pub date: NaiveDate,
    pub positions: Vec<PositionOccupancy>,
}

impl MachineOccupancy {
    pub fn occupied_count(&self) -> usize {
        self.positions.iter().filter(|p| p.occupant.is_some()).count()
    }

    /// 当日在机的批次（去重，按批次号排序）
    pub fn batches(&self) -> Vec<String> {
        let mut batches: Vec<String> = self
            .positions
            .iter()
            .filter_map(|p| p.occupant.as_ref().map(|o| o.batch_id.clone()))
            .collect();
        batches.sort();
        batches.dedup();
        batches
    }
}

// ==========================================
// CapacityApi - 产能查询 API
// ==========================================
pub struct CapacityApi {
    machine_repo: Arc<MachineRepository>,
    allocation_repo: Arc<AllocationRepository>,
    config_manager: Arc<ConfigManager>,
    resolver: MachineCapacityResolver,
}

impl CapacityApi {
    pub fn new(
        machine_repo: Arc<MachineRepository>,
        allocation_repo: Arc<AllocationRepository>,
        config_manager: Arc<ConfigManager>,
    ) -> Self {
        Self {
            machine_repo,
            allocation_repo,
            config_manager,
            resolver: MachineCapacityResolver::new(),
        }
    }

    /// 查询机器在区间内的可用产能
    pub fn get_available_capacity(
        &self,
        machine_id: &str,
        date_range: DateRange,
    ) -> ApiResult<CapacityInfo> {
        check_range(&date_range)?;
        let machine = self.machine_repo.get(machine_id)?;
        self.capacity_of(&machine, &date_range)
    }

    /// 按配置的默认策略给出拆分建议
    pub fn suggest_split(
        &self,
        total_eggs: i64,
        machine_ids: &[String],
        date_range: DateRange,
    ) -> ApiResult<AllocationPlan> {
        let strategy = self
            .config_manager
            .get_default_strategy()
            .map_err(|e| ApiError::InternalError(format!("读取分配策略失败: {}", e)))?;
        self.suggest_split_with(strategy, total_eggs, machine_ids, date_range)
    }

    /// 按指定策略给出拆分建议
    #[instrument(skip(self, machine_ids), fields(strategy = strategy.as_str(), candidates = machine_ids.len()))]
    pub fn suggest_split_with(
        &self,
        strategy: AllocationStrategy,
        total_eggs: i64,
        machine_ids: &[String],
        date_range: DateRange,
    ) -> ApiResult<AllocationPlan> {
        check_range(&date_range)?;

        let mut candidates = Vec::with_capacity(machine_ids.len());
        for machine_id in machine_ids {
            let machine = self.machine_repo.get(machine_id)?;
            candidates.push(self.capacity_of(&machine, &date_range)?);
        }

        let plan = strategy.planner().suggest_split(total_eggs, &candidates)?;
        debug!(lines = plan.lines.len(), planned = plan.planned_eggs(), "拆分建议完成");
        Ok(plan)
    }

    /// 查询某位置某日的占用者
    ///
    /// 单机模式下任意位置都返回整机占用者
    pub fn resolve_occupant(
        &self,
        machine_id: &str,
        position_key: &str,
        date: NaiveDate,
    ) -> ApiResult<Option<Occupant>> {
        let position = position_key
            .parse::<Position>()
            .map_err(ApiError::ValidationError)?;
        let machine = self.machine_repo.get(machine_id)?;
        let index = self.index_on(machine_id, date)?;
        Ok(index.resolve(machine_id, &machine.slot_for(position), date))
    }

    /// 机器在某日的 18 位置占用快照
    pub fn machine_occupancy(&self, machine_id: &str, date: NaiveDate) -> ApiResult<MachineOccupancy> {
        let machine = self.machine_repo.get(machine_id)?;
        let index = self.index_on(machine_id, date)?;

        let positions = PositionCatalog::all_positions()
            .into_iter()
            .map(|position| PositionOccupancy {
                position,
                occupant: index.resolve(machine_id, &machine.slot_for(position), date),
            })
            .collect();

        Ok(MachineOccupancy {
            machine_id: machine.machine_id,
            mode: machine.mode,
            date,
            positions,
        })
    }

    fn capacity_of(&self, machine: &Machine, date_range: &DateRange) -> ApiResult<CapacityInfo> {
        let records = self
            .allocation_repo
            .find_occupancy_overlapping(&machine.machine_id, date_range)?;
        let index = OccupancyIndex::from_records(records);
        Ok(self.resolver.available(machine, date_range, &index))
    }

    fn index_on(&self, machine_id: &str, date: NaiveDate) -> ApiResult<OccupancyIndex> {
        let records = self.allocation_repo.find_occupancy_on(machine_id, date)?;
        Ok(OccupancyIndex::from_records(records))
    }
}

fn check_range(date_range: &DateRange) -> ApiResult<()> {
    if date_range.start >= date_range.end {
        return Err(ApiError::ValidationError(format!("日期区间为空: {}", date_range)));
    }
    Ok(())
}
