// ==========================================
// 孵化机产能分配系统 - 主数据 API
// ==========================================
// 职责: 孵化机登记、入孵批次登记
// 说明: 批次生命周期由外部服务负责，此处只保存分配所需字段
// ==========================================

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::info;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::batch::Batch;
use crate::domain::machine::Machine;
use crate::domain::types::MachineMode;
use crate::engine::position_catalog::POSITION_COUNT;
use crate::repository::batch_repo::BatchRepository;
use crate::repository::machine_repo::MachineRepository;

pub struct MasterDataApi {
    machine_repo: Arc<MachineRepository>,
    batch_repo: Arc<BatchRepository>,
}

impl MasterDataApi {
    pub fn new(machine_repo: Arc<MachineRepository>, batch_repo: Arc<BatchRepository>) -> Self {
        Self {
            machine_repo,
            batch_repo,
        }
    }

    /// 登记孵化机
    ///
    /// 多段机容量至少能让每个位置放下一枚蛋
    pub fn register_machine(
        &self,
        machine_id: &str,
        machine_name: Option<&str>,
        capacity_eggs: i64,
        mode: MachineMode,
    ) -> ApiResult<Machine> {
        if machine_id.trim().is_empty() {
            return Err(ApiError::ValidationError("机器ID不能为空".to_string()));
        }
        if capacity_eggs <= 0 {
            return Err(ApiError::ValidationError(format!(
                "机器容量必须大于0: {}",
                capacity_eggs
            )));
        }
        if mode == MachineMode::Multi && capacity_eggs < POSITION_COUNT as i64 {
            return Err(ApiError::ValidationError(format!(
                "多段机容量不得小于位置数{}: {}",
                POSITION_COUNT, capacity_eggs
            )));
        }

        let mut machine = Machine::new(machine_id.trim(), capacity_eggs, mode);
        machine.machine_name = machine_name.map(str::to_string);
        self.machine_repo.insert(&machine)?;

        info!(machine_id = %machine.machine_id, capacity_eggs, %mode, "孵化机已登记");
        Ok(machine)
    }

    pub fn get_machine(&self, machine_id: &str) -> ApiResult<Machine> {
        Ok(self.machine_repo.get(machine_id)?)
    }

    pub fn list_machines(&self) -> ApiResult<Vec<Machine>> {
        Ok(self.machine_repo.list_all()?)
    }

    /// 登记入孵批次（草稿状态）
    pub fn register_batch(
        &self,
        batch_id: &str,
        flock_id: &str,
        set_date: NaiveDate,
        total_eggs_set: i64,
    ) -> ApiResult<Batch> {
        if batch_id.trim().is_empty() || flock_id.trim().is_empty() {
            return Err(ApiError::ValidationError("批次ID与鸡群ID不能为空".to_string()));
        }
        if total_eggs_set <= 0 {
            return Err(ApiError::ValidationError(format!(
                "入孵蛋数必须大于0: {}",
                total_eggs_set
            )));
        }

        let batch = Batch::new(batch_id.trim(), flock_id.trim(), set_date, total_eggs_set);
        self.batch_repo.insert(&batch)?;

        info!(batch_id = %batch.batch_id, flock_id = %batch.flock_id, %set_date, total_eggs_set, "批次已登记");
        Ok(batch)
    }

    pub fn get_batch(&self, batch_id: &str) -> ApiResult<Batch> {
        Ok(self.batch_repo.get(batch_id)?)
    }
}
