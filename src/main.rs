// ==========================================
// 孵化机产能分配系统 - 命令行入口
// ==========================================
// 用法:
//   hatchery-alloc                      初始化数据库并打印机器列表
//   hatchery-alloc occupancy <日期>     打印各机器当日的位置占用
// ==========================================

use anyhow::{anyhow, Context, Result};
use chrono::{Local, NaiveDate};
use hatchery_alloc::app::{get_default_db_path, AppState};
use hatchery_alloc::logging;

fn main() -> Result<()> {
    // HATCHERY_ALLOC_LOG_FORMAT=json 时输出 JSON 行
    match std::env::var("HATCHERY_ALLOC_LOG_FORMAT").as_deref() {
        Ok("json") => logging::init_json(),
        _ => logging::init(),
    }

    tracing::info!("==================================================");
    tracing::info!("{}", hatchery_alloc::APP_NAME);
    tracing::info!("系统版本: {}", hatchery_alloc::VERSION);
    tracing::info!("==================================================");

    let db_path = get_default_db_path();
    tracing::info!("使用数据库: {}", db_path);

    let state = AppState::new(db_path).map_err(|e| anyhow!(e))?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        None => print_machines(&state),
        Some("occupancy") => {
            let date = match args.get(1) {
                Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .with_context(|| format!("日期格式应为 YYYY-MM-DD: {}", raw))?,
                None => Local::now().date_naive(),
            };
            print_occupancy(&state, date)
        }
        Some(other) => Err(anyhow!("未知命令: {}", other)),
    }
}

fn print_machines(state: &AppState) -> Result<()> {
    let machines = state.master_data_api.list_machines()?;
    println!("已登记孵化机: {}", machines.len());
    for m in machines {
        println!(
            "  {:<12} {:<6} 容量={:<8} {}",
            m.machine_id,
            m.mode,
            m.capacity_eggs,
            m.machine_name.unwrap_or_default()
        );
    }
    Ok(())
}

fn print_occupancy(state: &AppState, date: NaiveDate) -> Result<()> {
    println!("占用日期: {}", date);
    for machine in state.master_data_api.list_machines()? {
        let snapshot = state
            .capacity_api
            .machine_occupancy(&machine.machine_id, date)?;
        println!(
            "  {:<12} {:<6} 占用位置 {:>2}/18  批次: {}",
            snapshot.machine_id,
            snapshot.mode,
            snapshot.occupied_count(),
            snapshot.batches().join(",")
        );
    }
    Ok(())
}
