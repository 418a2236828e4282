// ==========================================
// 孵化机产能分配系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod allocation;
pub mod batch;
pub mod machine;
pub mod position;
pub mod qa;
pub mod types;

// 重导出核心类型
pub use allocation::{Allocation, Occupant, OccupancyRecord};
pub use batch::{Batch, DateRange, INCUBATION_DAYS, SETTER_DAYS};
pub use machine::Machine;
pub use position::{Position, SlotKey, MACHINE_WIDE_KEY, WHOLE_MACHINE_KEY};
pub use qa::{Attribution, AttributionWarning, LinkageTarget, PositionLinkage, QaReading, QaValues};
pub use types::{BatchStatus, Level, LinkageType, MachineMode, QaMetric, Side, Zone};
