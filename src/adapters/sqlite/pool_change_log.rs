//! SQLite adapter for PoolChangeLog.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::adapters::sqlite::{format_datetime, parse_datetime, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{MembershipChange, PoolChangeRecord};
use crate::domain::ports::PoolChangeLog;

#[derive(Clone)]
pub struct SqlitePoolChangeLog {
    pool: SqlitePool,
}

impl SqlitePoolChangeLog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ChangeRow {
    sequence: i64,
    project_id: String,
    worker_id: Option<String>,
    change: String,
    recorded_at: String,
}

fn row_to_record(row: ChangeRow) -> DomainResult<PoolChangeRecord> {
    Ok(PoolChangeRecord {
        sequence: u64::try_from(row.sequence).unwrap_or(0),
        project_id: parse_uuid(&row.project_id)?,
        worker_id: row.worker_id.as_deref().map(parse_uuid).transpose()?,
        change: MembershipChange::from_str(&row.change)
            .ok_or_else(|| DomainError::SerializationError(format!("unknown pool change: {}", row.change)))?,
        recorded_at: parse_datetime(&row.recorded_at)?,
    })
}

#[async_trait]
impl PoolChangeLog for SqlitePoolChangeLog {
    async fn append_pool_change(
        &self,
        project_id: Uuid,
        worker_id: Option<Uuid>,
        change: MembershipChange,
        at: DateTime<Utc>,
    ) -> DomainResult<u64> {
        let result = sqlx::query(
            "INSERT INTO pool_change_log (project_id, worker_id, change, recorded_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(project_id.to_string())
        .bind(worker_id.map(|id| id.to_string()))
        .bind(change.as_str())
        .bind(format_datetime(&at))
        .execute(&self.pool)
        .await?;
        Ok(u64::try_from(result.last_insert_rowid()).unwrap_or(0))
    }

    async fn pool_changes_after(&self, after: u64, limit: usize) -> DomainResult<Vec<PoolChangeRecord>> {
        let rows: Vec<ChangeRow> = sqlx::query_as(
            "SELECT sequence, project_id, worker_id, change, recorded_at
             FROM pool_change_log
             WHERE sequence > ?
             ORDER BY sequence
             LIMIT ?",
        )
        .bind(i64::try_from(after).unwrap_or(i64::MAX))
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(row_to_record).collect()
    }

    async fn latest_pool_change(&self) -> DomainResult<u64> {
        let (latest,): (i64,) = sqlx::query_as("SELECT COALESCE(MAX(sequence), 0) FROM pool_change_log")
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(latest).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;

    #[tokio::test]
    async fn test_changes_read_back_in_order_after_cursor() {
        let log = SqlitePoolChangeLog::new(create_migrated_test_pool().await.unwrap());
        assert_eq!(log.latest_pool_change().await.unwrap(), 0);

        let project = Uuid::new_v4();
        let worker = Uuid::new_v4();
        let first = log
            .append_pool_change(project, Some(worker), MembershipChange::Joined, Utc::now())
            .await
            .unwrap();
        let second = log
            .append_pool_change(project, None, MembershipChange::Updated, Utc::now())
            .await
            .unwrap();
        assert!(second > first);
        assert_eq!(log.latest_pool_change().await.unwrap(), second);

        let all = log.pool_changes_after(0, 10).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].worker_id, Some(worker));
        assert_eq!(all[0].change, MembershipChange::Joined);
        assert_eq!(all[1].worker_id, None);

        let rest = log.pool_changes_after(first, 10).await.unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].sequence, second);
        assert_eq!(log.pool_changes_after(0, 1).await.unwrap().len(), 1);
    }
}
