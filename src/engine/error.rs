// ==========================================
// 孵化机产能分配系统 - 引擎层错误类型
// ==========================================
// 工具: thiserror 派生宏
// 说明: 四类业务错误原样返回调用方，引擎内部不重试
// ==========================================

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocationError {
    /// 输入不合法（负蛋数、未知位置键、缺字段）
    #[error("数据验证失败: {0}")]
    Validation(String),

    /// 候选机器可用容量总和不足
    #[error("产能不足: requested={requested}, available={available}")]
    InsufficientCapacity { requested: i64, available: i64 },

    /// 写入时检测到位置/日期重叠（含并发竞争失败）
    #[error("分配冲突: machine={machine_id}, slot={slot}, {message}")]
    AllocationConflict {
        machine_id: String,
        slot: String,
        message: String,
    },

    /// 确认时批次分配蛋数与入孵总数不一致
    #[error("批次分配不完整: batch={batch_id}, allocated={allocated}, expected={expected}")]
    PartialAllocation {
        batch_id: String,
        allocated: i64,
        expected: i64,
    },
}

pub type AllocationResult<T> = Result<T, AllocationError>;
