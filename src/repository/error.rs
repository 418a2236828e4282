// ==========================================
// 孵化机产能分配系统 - 仓储层错误类型
// ==========================================
// 工具: thiserror 派生宏
// 说明: 占用重叠由数据库触发器兜底 (RAISE ABORT 'OCCUPANCY_OVERLAP')
// ==========================================

use thiserror::Error;

/// 占用重叠触发器的中止消息
pub const OCCUPANCY_OVERLAP_MARKER: &str = "OCCUPANCY_OVERLAP";

/// 仓储层错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    // ===== 数据库错误 =====
    #[error("记录未找到: {entity} with id={id}")]
    NotFound { entity: String, id: String },

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库锁获取失败: {0}")]
    LockError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    #[error("数据库查询失败: {0}")]
    DatabaseQueryError(String),

    #[error("唯一约束违反: {0}")]
    UniqueConstraintViolation(String),

    #[error("外键约束违反: {0}")]
    ForeignKeyViolation(String),

    // ===== 占用约束 =====
    #[error("占用区间重叠: {0}")]
    OccupancyOverlap(String),

    // ===== 数据质量错误 =====
    #[error("字段值错误 (field={field}): {message}")]
    FieldValueError { field: String, message: String },

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// 实现 From<rusqlite::Error>
impl From<rusqlite::Error> for RepositoryError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(_, Some(msg)) => {
                if msg.contains(OCCUPANCY_OVERLAP_MARKER) {
                    RepositoryError::OccupancyOverlap(msg)
                } else if msg.contains("UNIQUE") {
                    RepositoryError::UniqueConstraintViolation(msg)
                } else if msg.contains("FOREIGN KEY") {
                    RepositoryError::ForeignKeyViolation(msg)
                } else {
                    RepositoryError::DatabaseQueryError(msg)
                }
            }
            rusqlite::Error::QueryReturnedNoRows => RepositoryError::NotFound {
                entity: "Unknown".to_string(),
                id: "Unknown".to_string(),
            },
            _ => RepositoryError::DatabaseQueryError(err.to_string()),
        }
    }
}

/// Result 类型别名
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// 行映射中文本列解析失败
pub(crate) fn text_column_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, message.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_abort_maps_to_overlap() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE t (x INTEGER);
             CREATE TRIGGER trg BEFORE INSERT ON t BEGIN SELECT RAISE(ABORT, 'OCCUPANCY_OVERLAP'); END;",
        )
        .unwrap();
        let err: RepositoryError = conn.execute("INSERT INTO t (x) VALUES (1)", []).unwrap_err().into();
        assert!(matches!(err, RepositoryError::OccupancyOverlap(_)));
    }
}
