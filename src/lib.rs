// ==========================================
// 孵化机产能分配系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 入孵批次的机器/位置分配账本 + QA 读数追溯
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 装配
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{BatchStatus, Level, LinkageType, MachineMode, QaMetric, Side, Zone};

// 领域实体
pub use domain::{
    Allocation, Attribution, AttributionWarning, Batch, DateRange, Machine, Occupant,
    OccupancyRecord, Position, PositionLinkage, QaReading, QaValues, SlotKey,
};

// 引擎
pub use engine::{
    AllocationError, AllocationPlan, AllocationPlanner, AllocationStrategy, AllocationValidator,
    CapacityInfo, MachineCapacityResolver, OccupancyIndex, PositionCatalog, QaReadingResolver,
};

// API
pub use api::{AllocationLedger, ApiError, ApiResult, CapacityApi, MasterDataApi, QaApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "孵化机产能分配系统";

// 数据库版本
pub const DB_VERSION: &str = "v0.1";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
        assert_eq!(db::CURRENT_SCHEMA_VERSION, 1);
    }
}
