// ==========================================
// 孵化机产能分配系统 - 引擎层
// ==========================================
// 数据流: PositionCatalog → MachineCapacityResolver → AllocationPlanner
//         → (AllocationLedger) → OccupancyIndex → QaReadingResolver
// ==========================================
// 职责: 实现业务规则引擎,不拼 SQL
// ==========================================

pub mod allocation_validator;
pub mod capacity_resolver;
pub mod error;
pub mod occupancy_index;
pub mod planner;
pub mod position_catalog;
pub mod qa_resolver;

// 重导出核心引擎
pub use allocation_validator::{AllocationRequest, AllocationValidator};
pub use capacity_resolver::{CapacityInfo, MachineCapacityResolver};
pub use error::{AllocationError, AllocationResult};
pub use occupancy_index::OccupancyIndex;
pub use planner::{
    AllocationPlan, AllocationPlanner, AllocationStrategy, FewestFragmentsPlanner,
    LargestFirstPlanner, PlanLine,
};
pub use position_catalog::{PositionCatalog, POSITION_COUNT};
pub use qa_resolver::QaReadingResolver;
