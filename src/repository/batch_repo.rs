// ==========================================
// 孵化机产能分配系统 - 入孵批次仓储
// ==========================================
// 职责: 管理 batch 表（批次生命周期服务的本地镜像）
// ==========================================

use crate::db::open_and_init;
use crate::domain::batch::Batch;
use crate::domain::types::BatchStatus;
use crate::repository::error::{text_column_error, RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

pub struct BatchRepository {
    conn: Arc<Mutex<Connection>>,
}

impl BatchRepository {
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

    pub fn insert(&self, batch: &Batch) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO batch (batch_id, flock_id, set_date, total_eggs_set, status)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                batch.batch_id,
                batch.flock_id,
                batch.set_date,
                batch.total_eggs_set,
                batch.status.to_string(),
            ],
        )?;
        Ok(())
    }

    pub fn find_by_id(&self, batch_id: &str) -> RepositoryResult<Option<Batch>> {
        let conn = self.get_conn()?;
        let batch = conn
            .query_row(
                r#"
                SELECT batch_id, flock_id, set_date, total_eggs_set, status
                FROM batch
                WHERE batch_id = ?1
                "#,
                params![batch_id],
                Self::map_row,
            )
            .optional()?;
        Ok(batch)
    }

    pub fn get(&self, batch_id: &str) -> RepositoryResult<Batch> {
        self.find_by_id(batch_id)?
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "Batch".to_string(),
                id: batch_id.to_string(),
            })
    }

    /// 更新批次状态（确认时记录确认时间）
    pub fn update_status(&self, batch_id: &str, status: BatchStatus) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            r#"
            UPDATE batch
            SET status = ?2,
                confirmed_at = CASE WHEN ?2 = 'CONFIRMED' THEN datetime('now') ELSE NULL END
            WHERE batch_id = ?1
            "#,
            params![batch_id, status.to_string()],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Batch".to_string(),
                id: batch_id.to_string(),
            });
        }
        Ok(())
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<Batch> {
        let status_raw: String = row.get(4)?;
        let status = status_raw
            .parse::<BatchStatus>()
            .map_err(|e| text_column_error(4, e))?;
        Ok(Batch {
            batch_id: row.get(0)?,
            flock_id: row.get(1)?,
            set_date: row.get(2)?,
            total_eggs_set: row.get(3)?,
            status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{configure_sqlite_connection, init_schema};
    use chrono::NaiveDate;

    fn repo() -> BatchRepository {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        BatchRepository::from_connection(Arc::new(Mutex::new(conn)))
    }

    #[test]
    fn test_batch_status_transitions() {
        let repo = repo();
        let set_date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        repo.insert(&Batch::new("B1", "F1", set_date, 12000)).unwrap();

        let loaded = repo.get("B1").unwrap();
        assert_eq!(loaded.set_date, set_date);
        assert_eq!(loaded.status, BatchStatus::Draft);

        repo.update_status("B1", BatchStatus::Confirmed).unwrap();
        assert!(repo.get("B1").unwrap().is_confirmed());

        assert!(matches!(
            repo.update_status("B9", BatchStatus::Draft),
            Err(RepositoryError::NotFound { .. })
        ));
    }
}
