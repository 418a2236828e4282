// ==========================================
// 孵化机产能分配系统 - 孵化机仓储
// ==========================================
// 职责: 管理 machine 表
// 说明: 机器模式与容量登记后不可修改
// ==========================================

use crate::db::open_and_init;
use crate::domain::machine::Machine;
use crate::domain::types::MachineMode;
use crate::repository::error::{text_column_error, RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

pub struct MachineRepository {
    conn: Arc<Mutex<Connection>>,
}

impl MachineRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_and_init(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 登记机器
    pub fn insert(&self, machine: &Machine) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO machine (machine_id, machine_name, capacity_eggs, mode)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                machine.machine_id,
                machine.machine_name,
                machine.capacity_eggs,
                machine.mode.to_string(),
            ],
        )?;
        Ok(())
    }

    pub fn find_by_id(&self, machine_id: &str) -> RepositoryResult<Option<Machine>> {
        let conn = self.get_conn()?;
        let machine = conn
            .query_row(
                r#"
                SELECT machine_id, machine_name, capacity_eggs, mode
                FROM machine
                WHERE machine_id = ?1
                "#,
                params![machine_id],
                Self::map_row,
            )
            .optional()?;
        Ok(machine)
    }

    /// 查询机器，不存在时返回 NotFound
    pub fn get(&self, machine_id: &str) -> RepositoryResult<Machine> {
        self.find_by_id(machine_id)?
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "Machine".to_string(),
                id: machine_id.to_string(),
            })
    }

    pub fn list_all(&self) -> RepositoryResult<Vec<Machine>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT machine_id, machine_name, capacity_eggs, mode
            FROM machine
            ORDER BY machine_id
            "#,
        )?;
        let machines = stmt
            .query_map([], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(machines)
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<Machine> {
        let mode_raw: String = row.get(3)?;
        let mode = mode_raw
            .parse::<MachineMode>()
            .map_err(|e| text_column_error(3, e))?;
        Ok(Machine {
            machine_id: row.get(0)?,
            machine_name: row.get(1)?,
            capacity_eggs: row.get(2)?,
            mode,
        })
    }
}
