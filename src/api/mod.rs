// ==========================================
// 孵化机产能分配系统 - API 层
// ==========================================
// 职责: 提供业务 API 接口,供批次生命周期服务与 QA 系统调用
// ==========================================

pub mod allocation_ledger;
pub mod capacity_api;
pub mod error;
pub mod machine_lock;
pub mod master_data_api;
pub mod qa_api;

// 重导出核心类型
pub use allocation_ledger::AllocationLedger;
pub use capacity_api::{CapacityApi, MachineOccupancy, PositionOccupancy};
pub use error::{ApiError, ApiResult};
pub use machine_lock::MachineLockRegistry;
pub use master_data_api::MasterDataApi;
pub use qa_api::QaApi;
