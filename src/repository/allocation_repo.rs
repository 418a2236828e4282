// ==========================================
// 孵化机产能分配系统 - 分配与占用仓储
// ==========================================
// 职责: 管理 allocation / occupancy_record 表
// 红线: 分配与其占用记录必须在同一事务内写入/删除
// 说明: 同槽位重叠由 occupancy_record 触发器兜底
// ==========================================

use crate::db::open_and_init;
use crate::domain::allocation::{Allocation, OccupancyRecord};
use crate::domain::batch::DateRange;
use crate::domain::position::{Position, SlotKey};
use crate::repository::error::{text_column_error, RepositoryError, RepositoryResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::sync::{Arc, Mutex};

const ALLOCATION_COLUMNS: &str = r#"
    allocation_id, batch_id, machine_id, eggs_allocated, range_start, range_end,
    positions_json, source_allocation_id, transferred_out_on, created_at
"#;

pub struct AllocationRepository {
    conn: Arc<Mutex<Connection>>,
}

impl AllocationRepository {
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

    // ==========================================
    // 写入
    // ==========================================

    /// 原子写入分配及其占用记录
    pub fn insert_with_occupancy(
        &self,
        allocation: &Allocation,
        records: &[OccupancyRecord],
    ) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        Self::insert_in_tx(&tx, allocation, records)?;
        tx.commit()?;
        Ok(())
    }

    /// 删除分配（占用记录级联删除）
    pub fn delete(&self, allocation_id: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "DELETE FROM allocation WHERE allocation_id = ?1",
            params![allocation_id],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Allocation".to_string(),
                id: allocation_id.to_string(),
            });
        }
        Ok(())
    }

    /// 删除转入分配并恢复来源分配的占用
    ///
    /// 来源占用延长回原结束日时可能与其后写入的占用冲突，由触发器拒绝
    pub fn delete_transfer_destination(
        &self,
        destination_id: &str,
        source: &Allocation,
    ) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let affected = tx.execute(
            "DELETE FROM allocation WHERE allocation_id = ?1",
            params![destination_id],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Allocation".to_string(),
                id: destination_id.to_string(),
            });
        }

        tx.execute(
            "UPDATE allocation SET transferred_out_on = NULL WHERE allocation_id = ?1",
            params![source.allocation_id],
        )?;
        tx.execute(
            "UPDATE occupancy_record SET occupied_to = ?2 WHERE allocation_id = ?1",
            params![source.allocation_id, source.date_range.end],
        )?;

        tx.commit()?;
        Ok(())
    }

    /// 删除批次全部分配并将批次退回草稿，返回删除条数
    pub fn delete_by_batch(&self, batch_id: &str) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        // 单条语句删除，转移链内的自引用外键在语句结束时校验
        let affected = tx.execute("DELETE FROM allocation WHERE batch_id = ?1", params![batch_id])?;
        tx.execute(
            "UPDATE batch SET status = 'DRAFT', confirmed_at = NULL WHERE batch_id = ?1",
            params![batch_id],
        )?;
        tx.commit()?;
        Ok(affected)
    }

    /// 提前转移: 来源分配截止于转移日，同时写入目的分配
    pub fn transfer(
        &self,
        source_id: &str,
        transfer_date: NaiveDate,
        destination: &Allocation,
        destination_records: &[OccupancyRecord],
    ) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let affected = tx.execute(
            r#"
            UPDATE allocation
            SET transferred_out_on = ?2
            WHERE allocation_id = ?1 AND transferred_out_on IS NULL
            "#,
            params![source_id, transfer_date],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Allocation(current)".to_string(),
                id: source_id.to_string(),
            });
        }
        tx.execute(
            "UPDATE occupancy_record SET occupied_to = ?2 WHERE allocation_id = ?1",
            params![source_id, transfer_date],
        )?;

        Self::insert_in_tx(&tx, destination, destination_records)?;

        tx.commit()?;
        Ok(())
    }

    fn insert_in_tx(
        tx: &Transaction<'_>,
        allocation: &Allocation,
        records: &[OccupancyRecord],
    ) -> RepositoryResult<()> {
        let positions_json = serde_json::to_string(&allocation.positions).map_err(|e| {
            RepositoryError::FieldValueError {
                field: "positions".to_string(),
                message: e.to_string(),
            }
        })?;

        tx.execute(
            r#"
            INSERT INTO allocation (
                allocation_id, batch_id, machine_id, eggs_allocated, range_start, range_end,
                positions_json, source_allocation_id, transferred_out_on, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                allocation.allocation_id,
                allocation.batch_id,
                allocation.machine_id,
                allocation.eggs_allocated,
                allocation.date_range.start,
                allocation.date_range.end,
                positions_json,
                allocation.source_allocation_id,
                allocation.transferred_out_on,
                allocation.created_at,
            ],
        )?;

        let mut stmt = tx.prepare(
            r#"
            INSERT INTO occupancy_record (
                allocation_id, machine_id, slot_key, batch_id, flock_id, occupied_from, occupied_to
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )?;
        for record in records {
            stmt.execute(params![
                record.allocation_id,
                record.machine_id,
                record.slot.key(),
                record.batch_id,
                record.flock_id,
                record.occupied_from,
                record.occupied_to,
            ])?;
        }
        Ok(())
    }

    // ==========================================
    // 查询
    // ==========================================

    pub fn find_by_id(&self, allocation_id: &str) -> RepositoryResult<Option<Allocation>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM allocation WHERE allocation_id = ?1",
            ALLOCATION_COLUMNS
        );
        let allocation = conn
            .query_row(&sql, params![allocation_id], Self::map_allocation)
            .optional()?;
        Ok(allocation)
    }

    pub fn get(&self, allocation_id: &str) -> RepositoryResult<Allocation> {
        self.find_by_id(allocation_id)?
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "Allocation".to_string(),
                id: allocation_id.to_string(),
            })
    }

    /// 批次的全部分配（含已转出的历史记录）
    pub fn find_by_batch(&self, batch_id: &str) -> RepositoryResult<Vec<Allocation>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM allocation WHERE batch_id = ?1 ORDER BY created_at, allocation_id",
            ALLOCATION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let allocations = stmt
            .query_map(params![batch_id], Self::map_allocation)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(allocations)
    }

    /// 批次当前有效分配的蛋数合计（转出的来源分配不计）
    pub fn sum_current_eggs(&self, batch_id: &str) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let total: i64 = conn.query_row(
            r#"
            SELECT COALESCE(SUM(eggs_allocated), 0)
            FROM allocation
            WHERE batch_id = ?1 AND transferred_out_on IS NULL
            "#,
            params![batch_id],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    /// 机器在区间内的占用记录（半开区间相交）
    pub fn find_occupancy_overlapping(
        &self,
        machine_id: &str,
        range: &DateRange,
    ) -> RepositoryResult<Vec<OccupancyRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT allocation_id, machine_id, slot_key, batch_id, flock_id, occupied_from, occupied_to
            FROM occupancy_record
            WHERE machine_id = ?1
              AND occupied_from < ?3
              AND ?2 < occupied_to
            ORDER BY slot_key, occupied_from
            "#,
        )?;
        let records = stmt
            .query_map(params![machine_id, range.start, range.end], Self::map_occupancy)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// 某日覆盖该机器的占用记录
    pub fn find_occupancy_on(
        &self,
        machine_id: &str,
        on_date: NaiveDate,
    ) -> RepositoryResult<Vec<OccupancyRecord>> {
        self.find_occupancy_overlapping(machine_id, &DateRange::single_day(on_date))
    }

    fn map_allocation(row: &Row<'_>) -> rusqlite::Result<Allocation> {
        let positions_json: String = row.get(6)?;
        let positions: Vec<Position> =
            serde_json::from_str(&positions_json).map_err(|e| text_column_error(6, e.to_string()))?;
        Ok(Allocation {
            allocation_id: row.get(0)?,
            batch_id: row.get(1)?,
            machine_id: row.get(2)?,
            eggs_allocated: row.get(3)?,
            date_range: DateRange {
                start: row.get(4)?,
                end: row.get(5)?,
            },
            positions,
            source_allocation_id: row.get(7)?,
            transferred_out_on: row.get(8)?,
            created_at: row.get(9)?,
        })
    }

    fn map_occupancy(row: &Row<'_>) -> rusqlite::Result<OccupancyRecord> {
        let slot_raw: String = row.get(2)?;
        let slot = slot_raw
            .parse::<SlotKey>()
            .map_err(|e| text_column_error(2, e))?;
        Ok(OccupancyRecord {
            allocation_id: row.get(0)?,
            machine_id: row.get(1)?,
            slot,
            batch_id: row.get(3)?,
            flock_id: row.get(4)?,
            occupied_from: row.get(5)?,
            occupied_to: row.get(6)?,
        })
    }
}
