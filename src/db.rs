// ==========================================
// 孵化机产能分配系统 - SQLite 连接初始化与建表
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键 / busy_timeout）
// - 幂等建表；占用不重叠由触发器在数据库层兜底
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 打开连接并确保 schema 存在
pub fn open_and_init(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = open_sqlite_connection(db_path)?;
    init_schema(&conn)?;
    Ok(conn)
}

/// 幂等建表
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- ===== 配置 =====
        CREATE TABLE IF NOT EXISTS config_scope (
            scope_id TEXT PRIMARY KEY,
            scope_type TEXT NOT NULL,
            scope_key TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(scope_type, scope_key)
        );
        INSERT OR IGNORE INTO config_scope (scope_id, scope_type, scope_key)
        VALUES ('global', 'GLOBAL', 'global');

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL REFERENCES config_scope(scope_id) ON DELETE CASCADE,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        -- ===== 孵化机 =====
        CREATE TABLE IF NOT EXISTS machine (
            machine_id TEXT PRIMARY KEY,
            machine_name TEXT,
            capacity_eggs INTEGER NOT NULL CHECK (capacity_eggs > 0),
            mode TEXT NOT NULL CHECK (mode IN ('SINGLE', 'MULTI')),
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- ===== 批次（外部生命周期服务的镜像） =====
        CREATE TABLE IF NOT EXISTS batch (
            batch_id TEXT PRIMARY KEY,
            flock_id TEXT NOT NULL,
            set_date TEXT NOT NULL,
            total_eggs_set INTEGER NOT NULL CHECK (total_eggs_set > 0),
            status TEXT NOT NULL DEFAULT 'DRAFT' CHECK (status IN ('DRAFT', 'CONFIRMED')),
            confirmed_at TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- ===== 分配 =====
        CREATE TABLE IF NOT EXISTS allocation (
            allocation_id TEXT PRIMARY KEY,
            batch_id TEXT NOT NULL REFERENCES batch(batch_id) ON DELETE CASCADE,
            machine_id TEXT NOT NULL REFERENCES machine(machine_id),
            eggs_allocated INTEGER NOT NULL CHECK (eggs_allocated > 0),
            range_start TEXT NOT NULL,
            range_end TEXT NOT NULL,
            positions_json TEXT NOT NULL DEFAULT '[]',
            source_allocation_id TEXT REFERENCES allocation(allocation_id),
            transferred_out_on TEXT,
            created_at TEXT NOT NULL,
            CHECK (range_start < range_end)
        );
        CREATE INDEX IF NOT EXISTS idx_allocation_batch ON allocation(batch_id);
        CREATE INDEX IF NOT EXISTS idx_allocation_machine ON allocation(machine_id, range_start);

        -- ===== 占用记录（与分配同生共死） =====
        CREATE TABLE IF NOT EXISTS occupancy_record (
            allocation_id TEXT NOT NULL REFERENCES allocation(allocation_id) ON DELETE CASCADE,
            machine_id TEXT NOT NULL REFERENCES machine(machine_id),
            slot_key TEXT NOT NULL,
            batch_id TEXT NOT NULL,
            flock_id TEXT NOT NULL,
            occupied_from TEXT NOT NULL,
            occupied_to TEXT NOT NULL,
            PRIMARY KEY (allocation_id, slot_key),
            CHECK (occupied_from < occupied_to)
        );
        CREATE INDEX IF NOT EXISTS idx_occupancy_machine_slot
            ON occupancy_record(machine_id, slot_key, occupied_from);

        -- 同一 (机器, 槽位) 的半开区间不得重叠
        CREATE TRIGGER IF NOT EXISTS trg_occupancy_no_overlap_insert
        BEFORE INSERT ON occupancy_record
        WHEN EXISTS (
            SELECT 1 FROM occupancy_record o
            WHERE o.machine_id = NEW.machine_id
              AND o.slot_key = NEW.slot_key
              AND o.occupied_from < NEW.occupied_to
              AND NEW.occupied_from < o.occupied_to
        )
        BEGIN
            SELECT RAISE(ABORT, 'OCCUPANCY_OVERLAP');
        END;

        CREATE TRIGGER IF NOT EXISTS trg_occupancy_no_overlap_update
        BEFORE UPDATE OF occupied_from, occupied_to, machine_id, slot_key ON occupancy_record
        WHEN EXISTS (
            SELECT 1 FROM occupancy_record o
            WHERE o.machine_id = NEW.machine_id
              AND o.slot_key = NEW.slot_key
              AND o.rowid <> OLD.rowid
              AND o.occupied_from < NEW.occupied_to
              AND NEW.occupied_from < o.occupied_to
        )
        BEGIN
            SELECT RAISE(ABORT, 'OCCUPANCY_OVERLAP');
        END;

        -- ===== QA 读数与追溯 =====
        CREATE TABLE IF NOT EXISTS qa_reading (
            reading_id TEXT PRIMARY KEY,
            machine_id TEXT NOT NULL REFERENCES machine(machine_id),
            check_date TEXT NOT NULL,
            metric TEXT NOT NULL,
            values_json TEXT NOT NULL,
            captured_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_qa_reading_machine_date
            ON qa_reading(machine_id, check_date);

        CREATE TABLE IF NOT EXISTS qa_position_linkage (
            linkage_id TEXT PRIMARY KEY,
            reading_id TEXT NOT NULL REFERENCES qa_reading(reading_id) ON DELETE CASCADE,
            target_key TEXT NOT NULL,
            linkage_type TEXT NOT NULL CHECK (linkage_type IN ('per_position', 'machine_wide')),
            resolved_flock_id TEXT,
            resolved_batch_id TEXT,
            value REAL
        );
        CREATE INDEX IF NOT EXISTS idx_linkage_reading ON qa_position_linkage(reading_id);
        CREATE INDEX IF NOT EXISTS idx_linkage_batch ON qa_position_linkage(resolved_batch_id);
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), None);

        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));
    }

    #[test]
    fn test_overlap_trigger_rejects_double_booking() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();

        conn.execute_batch(
            r#"
            INSERT INTO machine (machine_id, capacity_eggs, mode) VALUES ('M1', 18000, 'MULTI');
            INSERT INTO batch (batch_id, flock_id, set_date, total_eggs_set) VALUES ('B1', 'F1', '2026-01-01', 1000);
            INSERT INTO batch (batch_id, flock_id, set_date, total_eggs_set) VALUES ('B2', 'F2', '2026-01-10', 1000);
            INSERT INTO allocation (allocation_id, batch_id, machine_id, eggs_allocated, range_start, range_end, created_at)
                VALUES ('AL1', 'B1', 'M1', 1000, '2026-01-01', '2026-01-22', '2026-01-01 00:00:00');
            INSERT INTO allocation (allocation_id, batch_id, machine_id, eggs_allocated, range_start, range_end, created_at)
                VALUES ('AL2', 'B2', 'M1', 1000, '2026-01-10', '2026-01-31', '2026-01-10 00:00:00');
            INSERT INTO occupancy_record VALUES ('AL1', 'M1', 'A-Left-Top', 'B1', 'F1', '2026-01-01', '2026-01-22');
            "#,
        )
        .unwrap();

        let overlap = conn.execute(
            "INSERT INTO occupancy_record VALUES ('AL2', 'M1', 'A-Left-Top', 'B2', 'F2', '2026-01-10', '2026-01-31')",
            [],
        );
        assert!(overlap.is_err());

        // 相邻区间允许
        conn.execute(
            "INSERT INTO occupancy_record VALUES ('AL2', 'M1', 'A-Left-Top', 'B2', 'F2', '2026-01-22', '2026-01-31')",
            [],
        )
        .unwrap();
    }
}
