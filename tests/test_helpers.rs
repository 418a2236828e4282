// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的数据库初始化、测试数据生成等功能
// ==========================================

#![allow(dead_code)]

use chrono::NaiveDate;
use hatchery_alloc::app::AppState;
use hatchery_alloc::db::open_and_init;
use hatchery_alloc::MachineMode;
use std::error::Error;
use tempfile::NamedTempFile;

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file
        .path()
        .to_str()
        .ok_or("临时文件路径不是 UTF-8")?
        .to_string();

    open_and_init(&db_path)?;

    Ok((temp_file, db_path))
}

/// 创建临时数据库上的完整应用状态
pub fn create_test_state() -> (NamedTempFile, AppState) {
    let (temp_file, db_path) = create_test_db().unwrap();
    let state = AppState::new(db_path).unwrap();
    (temp_file, state)
}

/// 登记一台机器
pub fn add_machine(state: &AppState, machine_id: &str, capacity: i64, mode: MachineMode) {
    state
        .master_data_api
        .register_machine(machine_id, None, capacity, mode)
        .unwrap();
}

/// 登记一个批次
pub fn add_batch(state: &AppState, batch_id: &str, flock_id: &str, set_date: NaiveDate, total: i64) {
    state
        .master_data_api
        .register_batch(batch_id, flock_id, set_date, total)
        .unwrap();
}

/// 2026 年的日期
pub fn d(month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, month, day).unwrap()
}
