// ==========================================
// 孵化机产能分配系统 - QA 读数与追溯仓储
// ==========================================
// 职责: 管理 qa_reading / qa_position_linkage 表
// 红线: 读数与其追溯记录同一事务写入；重新追溯整体替换
// ==========================================

use crate::db::open_and_init;
use crate::domain::qa::{LinkageTarget, PositionLinkage, QaReading, QaValues};
use crate::domain::types::{LinkageType, QaMetric};
use crate::repository::error::{text_column_error, RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::sync::{Arc, Mutex};

pub struct QaRepository {
    conn: Arc<Mutex<Connection>>,
}

impl QaRepository {
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

    /// 保存读数及其追溯记录
    pub fn save_reading_with_linkages(
        &self,
        reading: &QaReading,
        linkages: &[PositionLinkage],
    ) -> RepositoryResult<()> {
        let values_json =
            serde_json::to_string(&reading.values).map_err(|e| RepositoryError::FieldValueError {
                field: "values".to_string(),
                message: e.to_string(),
            })?;

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            r#"
            INSERT INTO qa_reading (reading_id, machine_id, check_date, metric, values_json)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                reading.reading_id,
                reading.machine_id,
                reading.check_date,
                reading.metric.as_str(),
                values_json,
            ],
        )?;
        Self::insert_linkages(&tx, linkages)?;
        tx.commit()?;
        Ok(())
    }

    /// 替换读数的全部追溯记录
    pub fn replace_linkages(
        &self,
        reading_id: &str,
        linkages: &[PositionLinkage],
    ) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let removed = tx.execute(
            "DELETE FROM qa_position_linkage WHERE reading_id = ?1",
            params![reading_id],
        )?;
        Self::insert_linkages(&tx, linkages)?;
        tx.commit()?;
        Ok(removed)
    }

    fn insert_linkages(tx: &Transaction<'_>, linkages: &[PositionLinkage]) -> RepositoryResult<()> {
        let mut stmt = tx.prepare(
            r#"
            INSERT INTO qa_position_linkage (
                linkage_id, reading_id, target_key, linkage_type,
                resolved_flock_id, resolved_batch_id, value
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )?;
        for linkage in linkages {
            stmt.execute(params![
                linkage.linkage_id,
                linkage.reading_id,
                linkage.target.key(),
                linkage.linkage_type.as_str(),
                linkage.resolved_flock_id,
                linkage.resolved_batch_id,
                linkage.value,
            ])?;
        }
        Ok(())
    }

    pub fn find_reading(&self, reading_id: &str) -> RepositoryResult<Option<QaReading>> {
        let conn = self.get_conn()?;
        let reading = conn
            .query_row(
                r#"
                SELECT reading_id, machine_id, check_date, metric, values_json
                FROM qa_reading
                WHERE reading_id = ?1
                "#,
                params![reading_id],
                Self::map_reading,
            )
            .optional()?;
        Ok(reading)
    }

    pub fn get_reading(&self, reading_id: &str) -> RepositoryResult<QaReading> {
        self.find_reading(reading_id)?
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "QaReading".to_string(),
                id: reading_id.to_string(),
            })
    }

    /// 机器上自某日起的读数 ID（用于账本变更后重新追溯）
    pub fn list_reading_ids_for_machine(
        &self,
        machine_id: &str,
        from_date: chrono::NaiveDate,
    ) -> RepositoryResult<Vec<String>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT reading_id FROM qa_reading
            WHERE machine_id = ?1 AND check_date >= ?2
            ORDER BY check_date, reading_id
            "#,
        )?;
        let ids = stmt
            .query_map(params![machine_id, from_date], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }

    /// 读数的追溯记录
    pub fn list_linkages(&self, reading_id: &str) -> RepositoryResult<Vec<PositionLinkage>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT linkage_id, reading_id, target_key, linkage_type,
                   resolved_flock_id, resolved_batch_id, value
            FROM qa_position_linkage
            WHERE reading_id = ?1
            "#,
        )?;
        let mut linkages = stmt
            .query_map(params![reading_id], Self::map_linkage)?
            .collect::<Result<Vec<_>, _>>()?;
        sort_linkages(&mut linkages);
        Ok(linkages)
    }

    /// 追溯到某批次的全部记录
    pub fn list_linkages_by_batch(&self, batch_id: &str) -> RepositoryResult<Vec<PositionLinkage>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT l.linkage_id, l.reading_id, l.target_key, l.linkage_type,
                   l.resolved_flock_id, l.resolved_batch_id, l.value
            FROM qa_position_linkage l
            JOIN qa_reading r ON r.reading_id = l.reading_id
            WHERE l.resolved_batch_id = ?1
            ORDER BY r.check_date, l.reading_id
            "#,
        )?;
        let linkages = stmt
            .query_map(params![batch_id], Self::map_linkage)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(linkages)
    }

    fn map_reading(row: &Row<'_>) -> rusqlite::Result<QaReading> {
        let metric: String = row.get(3)?;
        let values_json: String = row.get(4)?;
        let values: QaValues =
            serde_json::from_str(&values_json).map_err(|e| text_column_error(4, e.to_string()))?;
        Ok(QaReading {
            reading_id: row.get(0)?,
            machine_id: row.get(1)?,
            check_date: row.get(2)?,
            metric: QaMetric::from(metric.as_str()),
            values,
        })
    }

    fn map_linkage(row: &Row<'_>) -> rusqlite::Result<PositionLinkage> {
        let target_raw: String = row.get(2)?;
        let target = LinkageTarget::parse_key(&target_raw).map_err(|e| text_column_error(2, e))?;
        let type_raw: String = row.get(3)?;
        let linkage_type = type_raw
            .parse::<LinkageType>()
            .map_err(|e| text_column_error(3, e))?;
        Ok(PositionLinkage {
            linkage_id: row.get(0)?,
            reading_id: row.get(1)?,
            target,
            linkage_type,
            resolved_flock_id: row.get(4)?,
            resolved_batch_id: row.get(5)?,
            value: row.get(6)?,
        })
    }
}

/// 位置按规范顺序，机器级追溯按鸡群排序
fn sort_linkages(linkages: &mut [PositionLinkage]) {
    linkages.sort_by(|a, b| {
        let ka = (a.target.position(), a.resolved_flock_id.clone());
        let kb = (b.target.position(), b.resolved_flock_id.clone());
        ka.cmp(&kb)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{configure_sqlite_connection, init_schema};
    use crate::domain::position::Position;
    use crate::domain::types::{Level, Side, Zone};
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn repo() -> QaRepository {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        conn.execute(
            "INSERT INTO machine (machine_id, capacity_eggs, mode) VALUES ('M1', 18000, 'MULTI')",
            [],
        )
        .unwrap();
        QaRepository::from_connection(Arc::new(Mutex::new(conn)))
    }

    fn linkage(reading_id: &str, target: LinkageTarget, batch: Option<&str>) -> PositionLinkage {
        PositionLinkage {
            linkage_id: uuid::Uuid::new_v4().to_string(),
            reading_id: reading_id.to_string(),
            target,
            linkage_type: match target {
                LinkageTarget::Position(_) => LinkageType::PerPosition,
                LinkageTarget::MachineWide => LinkageType::MachineWide,
            },
            resolved_flock_id: batch.map(|b| format!("F-{}", b)),
            resolved_batch_id: batch.map(str::to_string),
            value: Some(37.7),
        }
    }

    #[test]
    fn test_reading_round_trip_with_linkages() {
        let repo = repo();
        let p = Position::new(Zone::A, Side::Right, Level::Middle);
        let mut values = BTreeMap::new();
        values.insert(p, 37.7);
        let reading = QaReading::per_position(
            "M1",
            NaiveDate::from_ymd_opt(2026, 6, 3).unwrap(),
            QaMetric::Temperature,
            values,
        );
        let rid = reading.reading_id.clone();
        repo.save_reading_with_linkages(
            &reading,
            &[linkage(&rid, LinkageTarget::Position(p), Some("B1"))],
        )
        .unwrap();

        assert_eq!(repo.get_reading(&rid).unwrap(), reading);
        let linkages = repo.list_linkages(&rid).unwrap();
        assert_eq!(linkages.len(), 1);
        assert_eq!(linkages[0].target, LinkageTarget::Position(p));
        assert_eq!(repo.list_linkages_by_batch("B1").unwrap().len(), 1);
    }

    #[test]
    fn test_replace_linkages() {
        let repo = repo();
        let reading = QaReading::machine_wide(
            "M1",
            NaiveDate::from_ymd_opt(2026, 6, 3).unwrap(),
            QaMetric::Humidity,
            55.0,
        );
        let rid = reading.reading_id.clone();
        repo.save_reading_with_linkages(&reading, &[]).unwrap();

        let removed = repo
            .replace_linkages(
                &rid,
                &[
                    linkage(&rid, LinkageTarget::MachineWide, Some("B2")),
                    linkage(&rid, LinkageTarget::MachineWide, Some("B1")),
                ],
            )
            .unwrap();
        assert_eq!(removed, 0);

        let linkages = repo.list_linkages(&rid).unwrap();
        assert_eq!(linkages.len(), 2);
        assert_eq!(linkages[0].resolved_batch_id.as_deref(), Some("B1"));
        assert_eq!(repo.replace_linkages(&rid, &[]).unwrap(), 2);
    }
}
