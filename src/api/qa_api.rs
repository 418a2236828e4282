// ==========================================
// 孵化机产能分配系统 - QA 追溯 API
// ==========================================
// 职责: 读数入库并追溯鸡群/批次，账本变更后重新追溯
// 说明: 无法追溯只产生告警，读数照常保存
// ==========================================

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, instrument};

use crate::api::error::{ApiError, ApiResult};
use crate::config::config_manager::ConfigManager;
use crate::domain::qa::{Attribution, PositionLinkage, QaReading};
use crate::engine::occupancy_index::OccupancyIndex;
use crate::engine::qa_resolver::QaReadingResolver;
use crate::repository::allocation_repo::AllocationRepository;
use crate::repository::machine_repo::MachineRepository;
use crate::repository::qa_repo::QaRepository;

// ==========================================
// QaApi - QA 追溯 API
// ==========================================
pub struct QaApi {
    machine_repo: Arc<MachineRepository>,
    allocation_repo: Arc<AllocationRepository>,
    qa_repo: Arc<QaRepository>,
    config_manager: Arc<ConfigManager>,
}

impl QaApi {
    pub fn new(
        machine_repo: Arc<MachineRepository>,
        allocation_repo: Arc<AllocationRepository>,
        qa_repo: Arc<QaRepository>,
        config_manager: Arc<ConfigManager>,
    ) -> Self {
        Self {
            machine_repo,
            allocation_repo,
            qa_repo,
            config_manager,
        }
    }

    /// 保存读数并追溯到读数日的鸡群/批次
    #[instrument(skip(self, reading), fields(reading_id = %reading.reading_id, machine_id = %reading.machine_id))]
    pub fn attribute_reading(&self, reading: QaReading) -> ApiResult<Attribution> {
        let attribution = self.resolve(&reading)?;
        self.qa_repo
            .save_reading_with_linkages(&reading, &attribution.linkages)?;

        info!(
            linkages = attribution.linkages.len(),
            warnings = attribution.warnings.len(),
            "读数已追溯"
        );
        Ok(attribution)
    }

    /// 按当前账本重新追溯已保存的读数（整体替换旧追溯）
    #[instrument(skip(self))]
    pub fn reattribute_reading(&self, reading_id: &str) -> ApiResult<Attribution> {
        let reading = self.qa_repo.get_reading(reading_id)?;
        let attribution = self.resolve(&reading)?;
        let replaced = self
            .qa_repo
            .replace_linkages(reading_id, &attribution.linkages)?;

        info!(
            replaced,
            linkages = attribution.linkages.len(),
            "读数已重新追溯"
        );
        Ok(attribution)
    }

    /// 重新追溯机器自某日起的全部读数，返回处理条数
    pub fn reattribute_machine_since(&self, machine_id: &str, from_date: NaiveDate) -> ApiResult<usize> {
        self.machine_repo.get(machine_id)?;
        let reading_ids = self
            .qa_repo
            .list_reading_ids_for_machine(machine_id, from_date)?;
        for reading_id in &reading_ids {
            self.reattribute_reading(reading_id)?;
        }
        Ok(reading_ids.len())
    }

    /// 读数的追溯记录
    pub fn list_linkages(&self, reading_id: &str) -> ApiResult<Vec<PositionLinkage>> {
        self.qa_repo.get_reading(reading_id)?;
        Ok(self.qa_repo.list_linkages(reading_id)?)
    }

    /// 追溯到某批次的全部记录
    pub fn list_batch_linkages(&self, batch_id: &str) -> ApiResult<Vec<PositionLinkage>> {
        if batch_id.trim().is_empty() {
            return Err(ApiError::ValidationError("批次ID不能为空".to_string()));
        }
        Ok(self.qa_repo.list_linkages_by_batch(batch_id)?)
    }

    fn resolve(&self, reading: &QaReading) -> ApiResult<Attribution> {
        let machine = self.machine_repo.get(&reading.machine_id)?;
        let records = self
            .allocation_repo
            .find_occupancy_on(&machine.machine_id, reading.check_date)?;
        let index = OccupancyIndex::from_records(records);

        let log_unattributed = self
            .config_manager
            .get_warn_on_unattributed()
            .map_err(|e| ApiError::InternalError(format!("读取QA配置失败: {}", e)))?;
        let resolver = QaReadingResolver::new().with_unattributed_logging(log_unattributed);

        Ok(resolver.attribute(&machine, reading, &index)?)
    }
}
