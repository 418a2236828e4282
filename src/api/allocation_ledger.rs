// ==========================================
// 孵化机产能分配系统 - 分配账本 API
// ==========================================
// 职责: 分配的写入/取消/转移，批次确认与取消
// 红线:
// 1) 写入前在机器锁内重新读取占用并校验，不信任规划结果
// 2) 分配与占用记录同一事务写入，失败不留任何痕迹
// 3) 重叠由数据库触发器兜底，竞争失败返回 AllocationConflict
// ==========================================

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::api::machine_lock::MachineLockRegistry;
use crate::domain::allocation::{Allocation, OccupancyRecord};
use crate::domain::batch::{Batch, DateRange};
use crate::domain::machine::Machine;
use crate::domain::position::Position;
use crate::domain::types::BatchStatus;
use crate::engine::allocation_validator::{AllocationRequest, AllocationValidator};
use crate::engine::occupancy_index::OccupancyIndex;
use crate::repository::allocation_repo::AllocationRepository;
use crate::repository::batch_repo::BatchRepository;
use crate::repository::error::RepositoryError;
use crate::repository::machine_repo::MachineRepository;

// ==========================================
// AllocationLedger - 分配账本
// ==========================================
pub struct AllocationLedger {
    machine_repo: Arc<MachineRepository>,
    batch_repo: Arc<BatchRepository>,
    allocation_repo: Arc<AllocationRepository>,
    locks: Arc<MachineLockRegistry>,
    validator: AllocationValidator,
}

impl AllocationLedger {
    pub fn new(
        machine_repo: Arc<MachineRepository>,
        batch_repo: Arc<BatchRepository>,
        allocation_repo: Arc<AllocationRepository>,
        locks: Arc<MachineLockRegistry>,
    ) -> Self {
        Self {
            machine_repo,
            batch_repo,
            allocation_repo,
            locks,
            validator: AllocationValidator::new(),
        }
    }

    // ==========================================
    // 写入分配
    // ==========================================

    /// 为批次在某台机器上写入一条分配
    ///
    /// # 错误
    /// - ValidationError: 蛋数/位置/区间不合法，批次已确认，或累计超过入孵总数
    /// - InsufficientCapacity: 超过区间内可用产能
    /// - AllocationConflict: 所选位置已被占用（含并发竞争失败）
    /// - NotFound: 批次或机器不存在
    #[instrument(skip(self, positions), fields(positions = positions.len()))]
    pub fn create_allocation(
        &self,
        batch_id: &str,
        machine_id: &str,
        eggs: i64,
        positions: &[Position],
        date_range: DateRange,
    ) -> ApiResult<Allocation> {
        if date_range.start >= date_range.end {
            return Err(ApiError::ValidationError(format!(
                "日期区间为空: {}",
                date_range
            )));
        }

        let batch = self.batch_repo.get(batch_id)?;
        let expected_range = batch.incubation_range();
        if date_range != expected_range {
            return Err(ApiError::ValidationError(format!(
                "分配区间{}与批次{}的孵化周期{}不一致",
                date_range, batch_id, expected_range
            )));
        }
        let machine = self.machine_repo.get(machine_id)?;

        let keys = vec![
            machine.machine_id.clone(),
            MachineLockRegistry::batch_key(&batch.batch_id),
        ];
        let result = self.locks.with_locks(&keys, || {
            // 锁内重读批次状态，防止与确认并发
            let batch = self.batch_repo.get(batch_id)?;
            if batch.is_confirmed() {
                return Err(ApiError::ValidationError(format!(
                    "批次{}已确认，不能再追加分配",
                    batch_id
                )));
            }
            self.create_locked(&batch, &machine, eggs, positions, date_range)
        });

        match &result {
            Ok(allocation) => info!(
                allocation_id = %allocation.allocation_id,
                batch_id = %batch.batch_id,
                machine_id = %machine.machine_id,
                eggs,
                "分配已写入"
            ),
            Err(e) => warn!(
                batch_id = %batch.batch_id,
                machine_id = %machine.machine_id,
                eggs,
                error = %e,
                "分配被拒绝"
            ),
        }
        result
    }

    fn create_locked(
        &self,
        batch: &Batch,
        machine: &Machine,
        eggs: i64,
        positions: &[Position],
        date_range: DateRange,
    ) -> ApiResult<Allocation> {
        let index = self.load_index(&machine.machine_id, &date_range, None)?;
        let request = AllocationRequest {
            machine,
            eggs,
            positions,
            date_range,
        };
        self.validator.validate(&request, &index)?;

        let already = self.allocation_repo.sum_current_eggs(&batch.batch_id)?;
        if already + eggs > batch.total_eggs_set {
            return Err(ApiError::ValidationError(format!(
                "批次{}累计分配超过入孵总数: allocated={}, requested={}, total={}",
                batch.batch_id, already, eggs, batch.total_eggs_set
            )));
        }

        let mut sorted_positions = positions.to_vec();
        sorted_positions.sort();

        let allocation = Allocation {
            allocation_id: Uuid::new_v4().to_string(),
            batch_id: batch.batch_id.clone(),
            machine_id: machine.machine_id.clone(),
            eggs_allocated: eggs,
            date_range,
            positions: sorted_positions,
            source_allocation_id: None,
            transferred_out_on: None,
            created_at: chrono::Local::now().naive_local(),
        };
        let records = allocation.occupancy_records(&batch.flock_id);

        self.allocation_repo
            .insert_with_occupancy(&allocation, &records)
            .map_err(|e| conflict_on(&machine.machine_id, e))?;

        Ok(allocation)
    }

    // ==========================================
    // 取消分配
    // ==========================================

    /// 取消分配（占用记录同事务删除）
    ///
    /// 转入分配被取消时，来源分配恢复到原结束日
    #[instrument(skip(self))]
    pub fn cancel_allocation(&self, allocation_id: &str) -> ApiResult<()> {
        let allocation = self.allocation_repo.get(allocation_id)?;
        let source_machine = match &allocation.source_allocation_id {
            Some(source_id) => Some(self.allocation_repo.get(source_id)?.machine_id),
            None => None,
        };

        let mut keys = vec![
            allocation.machine_id.clone(),
            MachineLockRegistry::batch_key(&allocation.batch_id),
        ];
        keys.extend(source_machine);

        self.locks
            .with_locks(&keys, || self.cancel_locked(allocation_id))?;

        info!(
            allocation_id,
            batch_id = %allocation.batch_id,
            machine_id = %allocation.machine_id,
            restored_source = ?allocation.source_allocation_id,
            "分配已取消"
        );
        Ok(())
    }

    fn cancel_locked(&self, allocation_id: &str) -> ApiResult<()> {
        let allocation = self.allocation_repo.get(allocation_id)?;
        if !allocation.is_current() {
            return Err(ApiError::ValidationError(format!(
                "分配{}已于{}转出，需先取消其转入分配",
                allocation_id,
                allocation
                    .transferred_out_on
                    .map(|d| d.to_string())
                    .unwrap_or_default()
            )));
        }

        let batch = self.batch_repo.get(&allocation.batch_id)?;
        let source = match &allocation.source_allocation_id {
            Some(source_id) => Some(self.allocation_repo.get(source_id)?),
            None => None,
        };
        // 直接取消会让已确认批次的蛋数对不上；撤销转移不改变合计
        if batch.is_confirmed() && source.is_none() {
            return Err(ApiError::ValidationError(format!(
                "批次{}已确认，不能取消其分配",
                batch.batch_id
            )));
        }

        match &source {
            Some(src) => self
                .allocation_repo
                .delete_transfer_destination(allocation_id, src)
                .map_err(|e| conflict_on(&src.machine_id, e)),
            None => self.allocation_repo.delete(allocation_id).map_err(ApiError::from),
        }
    }

    /// 取消批次: 删除全部分配并退回草稿状态
    #[instrument(skip(self))]
    pub fn cancel_batch(&self, batch_id: &str) -> ApiResult<usize> {
        let batch = self.batch_repo.get(batch_id)?;
        let allocations = self.allocation_repo.find_by_batch(batch_id)?;

        let mut keys: Vec<String> = allocations.iter().map(|a| a.machine_id.clone()).collect();
        keys.push(MachineLockRegistry::batch_key(&batch.batch_id));

        let removed = self
            .locks
            .with_locks(&keys, || self.allocation_repo.delete_by_batch(batch_id))?;

        info!(batch_id, removed, "批次已取消");
        Ok(removed)
    }

    // ==========================================
    // 批次确认
    // ==========================================

    /// 确认批次: 当前分配蛋数合计必须等于入孵总数
    #[instrument(skip(self))]
    pub fn confirm_batch(&self, batch_id: &str) -> ApiResult<Batch> {
        let batch = self.batch_repo.get(batch_id)?;
        if batch.is_confirmed() {
            return Ok(batch);
        }

        let keys = vec![MachineLockRegistry::batch_key(batch_id)];
        self.locks.with_locks(&keys, || {
            if self.batch_repo.get(batch_id)?.is_confirmed() {
                return Ok(());
            }
            let allocated = self.allocation_repo.sum_current_eggs(batch_id)?;
            if allocated != batch.total_eggs_set {
                warn!(batch_id, allocated, expected = batch.total_eggs_set, "批次分配不完整");
                return Err(ApiError::PartialAllocation {
                    batch_id: batch_id.to_string(),
                    allocated,
                    expected: batch.total_eggs_set,
                });
            }
            self.batch_repo.update_status(batch_id, BatchStatus::Confirmed)?;
            Ok(())
        })?;

        info!(batch_id, total = batch.total_eggs_set, "批次已确认");
        Ok(Batch {
            status: BatchStatus::Confirmed,
            ..batch
        })
    }

    // ==========================================
    // 提前转移
    // ==========================================

    /// 将分配在转移日移到目标机器（出雏阶段或设备故障）
    ///
    /// 来源占用截止于转移日，目标分配自转移日持续到原结束日
    #[instrument(skip(self, dest_positions), fields(dest_positions = dest_positions.len()))]
    pub fn transfer_allocation(
        &self,
        allocation_id: &str,
        dest_machine_id: &str,
        transfer_date: NaiveDate,
        dest_positions: &[Position],
    ) -> ApiResult<Allocation> {
        let source = self.allocation_repo.get(allocation_id)?;
        let batch = self.batch_repo.get(&source.batch_id)?;
        let dest_machine = self.machine_repo.get(dest_machine_id)?;

        let keys = vec![
            source.machine_id.clone(),
            dest_machine.machine_id.clone(),
            MachineLockRegistry::batch_key(&source.batch_id),
        ];
        let result = self.locks.with_locks(&keys, || {
            // 锁内重读，防止并发转移
            let source = self.allocation_repo.get(allocation_id)?;
            self.transfer_locked(&source, &batch, &dest_machine, transfer_date, dest_positions)
        });

        match &result {
            Ok(dest) => info!(
                source_allocation_id = allocation_id,
                allocation_id = %dest.allocation_id,
                from_machine = %source.machine_id,
                to_machine = %dest.machine_id,
                %transfer_date,
                "分配已转移"
            ),
            Err(e) => warn!(allocation_id, dest_machine_id, error = %e, "转移被拒绝"),
        }
        result
    }

    fn transfer_locked(
        &self,
        source: &Allocation,
        batch: &Batch,
        dest_machine: &Machine,
        transfer_date: NaiveDate,
        dest_positions: &[Position],
    ) -> ApiResult<Allocation> {
        if !source.is_current() {
            return Err(ApiError::ValidationError(format!(
                "分配{}已转出，不能重复转移",
                source.allocation_id
            )));
        }
        if transfer_date <= source.date_range.start || transfer_date >= source.date_range.end {
            return Err(ApiError::ValidationError(format!(
                "转移日{}必须位于分配区间{}内部",
                transfer_date, source.date_range
            )));
        }

        let dest_range = DateRange {
            start: transfer_date,
            end: source.date_range.end,
        };
        // 来源分配在转移日截止，不与目标区间冲突
        let index = self.load_index(
            &dest_machine.machine_id,
            &dest_range,
            Some(source.allocation_id.as_str()),
        )?;
        let request = AllocationRequest {
            machine: dest_machine,
            eggs: source.eggs_allocated,
            positions: dest_positions,
            date_range: dest_range,
        };
        self.validator.validate(&request, &index)?;

        let mut positions = dest_positions.to_vec();
        positions.sort();

        let destination = Allocation {
            allocation_id: Uuid::new_v4().to_string(),
            batch_id: source.batch_id.clone(),
            machine_id: dest_machine.machine_id.clone(),
            eggs_allocated: source.eggs_allocated,
            date_range: dest_range,
            positions,
            source_allocation_id: Some(source.allocation_id.clone()),
            transferred_out_on: None,
            created_at: chrono::Local::now().naive_local(),
        };
        let records = destination.occupancy_records(&batch.flock_id);

        self.allocation_repo
            .transfer(&source.allocation_id, transfer_date, &destination, &records)
            .map_err(|e| conflict_on(&dest_machine.machine_id, e))?;

        Ok(destination)
    }

    // ==========================================
    // 查询
    // ==========================================

    /// 批次的全部分配（含转移历史）
    pub fn list_batch_allocations(&self, batch_id: &str) -> ApiResult<Vec<Allocation>> {
        self.batch_repo.get(batch_id)?;
        Ok(self.allocation_repo.find_by_batch(batch_id)?)
    }

    /// 批次当前有效分配的蛋数合计
    pub fn allocated_eggs(&self, batch_id: &str) -> ApiResult<i64> {
        Ok(self.allocation_repo.sum_current_eggs(batch_id)?)
    }

    fn load_index(
        &self,
        machine_id: &str,
        range: &DateRange,
        exclude_allocation: Option<&str>,
    ) -> ApiResult<OccupancyIndex> {
        let records: Vec<OccupancyRecord> = self
            .allocation_repo
            .find_occupancy_overlapping(machine_id, range)?
            .into_iter()
            .filter(|r| Some(r.allocation_id.as_str()) != exclude_allocation)
            .collect();
        Ok(OccupancyIndex::from_records(records))
    }
}

/// 触发器拒绝的写入补上机器信息
fn conflict_on(machine_id: &str, err: RepositoryError) -> ApiError {
    match err {
        RepositoryError::OccupancyOverlap(msg) => ApiError::AllocationConflict {
            machine_id: machine_id.to_string(),
            slot: String::new(),
            message: format!("写入时检测到占用重叠: {}", msg),
        },
        other => other.into(),
    }
}
