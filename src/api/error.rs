// ==========================================
// 孵化机产能分配系统 - API层错误类型
// ==========================================
// 职责: 定义调用方可见的错误类型，转换引擎/仓储错误
// 说明: 四类业务错误原样返回，不做内部重试
// ==========================================

use crate::engine::error::AllocationError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 业务错误
    // ==========================================
    #[error("数据验证失败: {0}")]
    ValidationError(String),

    #[error("产能不足: requested={requested}, available={available}")]
    InsufficientCapacity { requested: i64, available: i64 },

    #[error("分配冲突: machine={machine_id}, slot={slot}, {message}")]
    AllocationConflict {
        machine_id: String,
        slot: String,
        message: String,
    },

    #[error("批次分配不完整: batch={batch_id}, allocated={allocated}, expected={expected}")]
    PartialAllocation {
        batch_id: String,
        allocated: i64,
        expected: i64,
    },

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    /// 写入时的重叠冲突（触发器兜底，含并发竞争失败）
    pub fn is_conflict(&self) -> bool {
        matches!(self, ApiError::AllocationConflict { .. })
    }
}

// ==========================================
// 从 AllocationError 转换
// ==========================================
impl From<AllocationError> for ApiError {
    fn from(err: AllocationError) -> Self {
        match err {
            AllocationError::Validation(msg) => ApiError::ValidationError(msg),
            AllocationError::InsufficientCapacity { requested, available } => {
                ApiError::InsufficientCapacity { requested, available }
            }
            AllocationError::AllocationConflict {
                machine_id,
                slot,
                message,
            } => ApiError::AllocationConflict {
                machine_id,
                slot,
                message,
            },
            AllocationError::PartialAllocation {
                batch_id,
                allocated,
                expected,
            } => ApiError::PartialAllocation {
                batch_id,
                allocated,
                expected,
            },
        }
    }
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("外键约束违反: {}", msg))
            }

            // 触发器拒绝: 另一写入者已抢先占用
            RepositoryError::OccupancyOverlap(msg) => ApiError::AllocationConflict {
                machine_id: String::new(),
                slot: String::new(),
                message: format!("写入时检测到占用重叠: {}", msg),
            },

            RepositoryError::FieldValueError { field, message } => {
                ApiError::ValidationError(format!("字段{}错误: {}", field, message))
            }
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
