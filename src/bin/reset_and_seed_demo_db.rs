use chrono::{Duration, Local};
use std::collections::BTreeMap;
use std::error::Error;
use std::fs;
use std::path::Path;

use hatchery_alloc::app::{get_default_db_path, AppState};
use hatchery_alloc::domain::{DateRange, QaReading};
use hatchery_alloc::engine::PositionCatalog;
use hatchery_alloc::{logging, MachineMode, QaMetric};

// 演示场景: 两台多段机 + 一台单机，三个批次
const MULTI_CAPACITY: i64 = 18_000;
const SINGLE_CAPACITY: i64 = 45_000;
const HATCHER_CAPACITY: i64 = 20_000;

fn main() -> Result<(), Box<dyn Error>> {
    logging::init();

    let db_path = std::env::args().nth(1).unwrap_or_else(get_default_db_path);
    backup_and_reset_db(&db_path)?;

    let state = AppState::new(db_path.clone())?;
    seed_demo(&state)?;

    let today = Local::now().date_naive();
    for machine in state.master_data_api.list_machines()? {
        let snapshot = state.capacity_api.machine_occupancy(&machine.machine_id, today)?;
        println!(
            "{:<6} occupied={:>2}/18 batches=[{}]",
            snapshot.machine_id,
            snapshot.occupied_count(),
            snapshot.batches().join(",")
        );
    }
    println!("Seeded {}", db_path);
    Ok(())
}

fn backup_and_reset_db(db_path: &str) -> Result<(), Box<dyn Error>> {
    let path = Path::new(db_path);
    if !path.exists() {
        return Ok(());
    }

    let ts = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let backup_path = format!("{}.bak.{}", db_path, ts);
    fs::copy(path, &backup_path)?;
    fs::remove_file(path)?;

    eprintln!("Backed up {} -> {}", db_path, backup_path);
    Ok(())
}

fn seed_demo(state: &AppState) -> Result<(), Box<dyn Error>> {
    let master = &state.master_data_api;
    let ledger = &state.allocation_ledger;

    master.register_machine("MS-01", Some("多段机1号"), MULTI_CAPACITY, MachineMode::Multi)?;
    master.register_machine("MS-02", Some("多段机2号"), MULTI_CAPACITY, MachineMode::Multi)?;
    master.register_machine("SS-01", Some("单机1号"), SINGLE_CAPACITY, MachineMode::Single)?;
    master.register_machine("HT-01", Some("出雏机1号"), HATCHER_CAPACITY, MachineMode::Single)?;

    let today = Local::now().date_naive();
    let all = PositionCatalog::all_positions();

    // 批次1: 一周前入孵，整批放在 MS-01 前 6 个位置
    let set1 = today - Duration::days(7);
    master.register_batch("B-DEMO-1", "FLOCK-A", set1, 6_000)?;
    ledger.create_allocation("B-DEMO-1", "MS-01", 6_000, &all[..6], DateRange::incubation(set1))?;
    ledger.confirm_batch("B-DEMO-1")?;
    let batch1 = master.get_batch("B-DEMO-1")?;
    // 第 18 天整批落盘到出雏机
    let setter_allocation = ledger
        .list_batch_allocations("B-DEMO-1")?
        .into_iter()
        .next()
        .ok_or("B-DEMO-1 没有分配")?;
    ledger.transfer_allocation(
        &setter_allocation.allocation_id,
        "HT-01",
        batch1.hatcher_transfer_date(),
        &[],
    )?;

    // 批次2: 三天前入孵，拆到 MS-01 与 MS-02
    let set2 = today - Duration::days(3);
    master.register_batch("B-DEMO-2", "FLOCK-B", set2, 9_000)?;
    let range2 = DateRange::incubation(set2);
    let plan = state.capacity_api.suggest_split(
        9_000,
        &["MS-01".to_string(), "MS-02".to_string()],
        range2,
    )?;
    for line in &plan.lines {
        ledger.create_allocation("B-DEMO-2", &line.machine_id, line.eggs, &line.suggested_positions, range2)?;
    }
    ledger.confirm_batch("B-DEMO-2")?;

    // 批次3: 单机整机
    let set3 = today - Duration::days(1);
    master.register_batch("B-DEMO-3", "FLOCK-C", set3, 40_000)?;
    ledger.create_allocation("B-DEMO-3", "SS-01", 40_000, &[], DateRange::incubation(set3))?;
    ledger.confirm_batch("B-DEMO-3")?;

    // QA 读数
    let mut temps = BTreeMap::new();
    for (i, p) in all.iter().enumerate() {
        temps.insert(*p, 37.5 + (i as f64) * 0.02);
    }
    state
        .qa_api
        .attribute_reading(QaReading::per_position("MS-01", today, QaMetric::Temperature, temps))?;
    state
        .qa_api
        .attribute_reading(QaReading::machine_wide("MS-01", today, QaMetric::Humidity, 55.0))?;
    state
        .qa_api
        .attribute_reading(QaReading::machine_wide("SS-01", today, QaMetric::Angle, 45.0))?;

    Ok(())
}
