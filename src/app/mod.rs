// ==========================================
// 孵化机产能分配系统 - 应用层
// ==========================================
// 职责: 装配仓储与 API，供进程入口使用
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState};
