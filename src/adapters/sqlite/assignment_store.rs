//! SQLite adapter for AssignmentStore.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::adapters::sqlite::directory_store::{row_to_worker, WorkerRow};
use crate::adapters::sqlite::{format_datetime, parse_datetime, parse_optional_datetime, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    Assignment, AssignmentFilter, AssignmentStatus, InsertOutcome, OverdueAssignment,
    OverdueCandidate, PoolMember, Task, TaskCoverage, UnreadableRow,
};
use crate::domain::ports::AssignmentStore;

const ASSIGNMENT_COLUMNS: &str = "id, project_id, task_id, worker_id, status, assigned_at, due_at, \
     started_at, completed_at, expired_at";

#[derive(Clone)]
pub struct SqliteAssignmentStore {
    pool: SqlitePool,
}

impl SqliteAssignmentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct AssignmentRow {
    id: String,
    project_id: String,
    task_id: String,
    worker_id: String,
    status: String,
    assigned_at: String,
    due_at: String,
    started_at: Option<String>,
    completed_at: Option<String>,
    expired_at: Option<String>,
}

fn parse_status(s: &str) -> DomainResult<AssignmentStatus> {
    AssignmentStatus::from_str(s)
        .ok_or_else(|| DomainError::SerializationError(format!("unknown assignment status: {s}")))
}

fn row_to_assignment(row: AssignmentRow) -> DomainResult<Assignment> {
    Ok(Assignment {
        id: parse_uuid(&row.id)?,
        project_id: parse_uuid(&row.project_id)?,
        task_id: parse_uuid(&row.task_id)?,
        worker_id: parse_uuid(&row.worker_id)?,
        status: parse_status(&row.status)?,
        assigned_at: parse_datetime(&row.assigned_at)?,
        due_at: parse_datetime(&row.due_at)?,
        started_at: parse_optional_datetime(row.started_at)?,
        completed_at: parse_optional_datetime(row.completed_at)?,
        expired_at: parse_optional_datetime(row.expired_at)?,
    })
}

#[derive(sqlx::FromRow)]
struct MemberRow {
    id: String,
    email: String,
    status: String,
    tier: String,
    created_at: String,
    joined_at: String,
}

#[derive(sqlx::FromRow)]
struct CoverageRow {
    id: String,
    project_id: String,
    required_tag: Option<String>,
    created_at: String,
    coverage: i64,
}

#[derive(sqlx::FromRow)]
struct OverdueRow {
    id: String,
    project_id: String,
    task_id: String,
    worker_id: String,
    status: String,
    due_at: String,
}

fn overdue_from_row(row: &OverdueRow) -> DomainResult<OverdueAssignment> {
    Ok(OverdueAssignment {
        id: parse_uuid(&row.id)?,
        project_id: parse_uuid(&row.project_id)?,
        task_id: parse_uuid(&row.task_id)?,
        worker_id: parse_uuid(&row.worker_id)?,
        status: parse_status(&row.status)?,
        due_at: parse_datetime(&row.due_at)?,
    })
}

fn decode_overdue(row: OverdueRow) -> OverdueCandidate {
    overdue_from_row(&row).map_err(|e| UnreadableRow {
        assignment_id: Uuid::parse_str(&row.id).ok(),
        project_id: Uuid::parse_str(&row.project_id).ok(),
        error: e.to_string(),
    })
}

/// Column stamped when a row enters `status`.
fn timestamp_column(status: AssignmentStatus) -> DomainResult<&'static str> {
    match status {
        AssignmentStatus::InProgress => Ok("started_at"),
        AssignmentStatus::Completed => Ok("completed_at"),
        AssignmentStatus::Expired => Ok("expired_at"),
        AssignmentStatus::Assigned => Err(DomainError::InvalidStateTransition {
            from: "any".to_string(),
            to: status.as_str().to_string(),
            reason: "rows are only ever created as assigned".to_string(),
        }),
    }
}

#[async_trait]
impl AssignmentStore for SqliteAssignmentStore {
    async fn active_pool_members(&self, project_id: Uuid) -> DomainResult<Vec<PoolMember>> {
        let rows: Vec<MemberRow> = sqlx::query_as(
            "SELECT w.id, w.email, w.status, w.tier, w.created_at, m.joined_at
             FROM pool_memberships m
             JOIN workers w ON w.id = m.worker_id
             WHERE m.project_id = ? AND m.active = 1
             ORDER BY m.joined_at, w.id",
        )
        .bind(project_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let joined_at = parse_datetime(&row.joined_at)?;
                let worker = row_to_worker(WorkerRow {
                    id: row.id,
                    email: row.email,
                    status: row.status,
                    tier: row.tier,
                    created_at: row.created_at,
                })?;
                Ok(PoolMember { worker, joined_at })
            })
            .collect()
    }

    async fn projects_with_active_pool(&self) -> DomainResult<Vec<Uuid>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT DISTINCT project_id FROM pool_memberships WHERE active = 1 ORDER BY project_id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(|(id,)| parse_uuid(id)).collect()
    }

    async fn deficient_tasks(&self, project_id: Uuid, overlap: u32) -> DomainResult<Vec<TaskCoverage>> {
        let project = project_id.to_string();

        let rows: Vec<CoverageRow> = sqlx::query_as(
            "SELECT t.id, t.project_id, t.required_tag, t.created_at,
                    COALESCE(SUM(CASE WHEN a.status IN ('assigned', 'in_progress', 'completed')
                                      THEN 1 ELSE 0 END), 0) AS coverage
             FROM tasks t
             LEFT JOIN assignments a ON a.task_id = t.id
             WHERE t.project_id = ?
             GROUP BY t.id
             HAVING coverage < ?
             ORDER BY t.created_at, t.id",
        )
        .bind(&project)
        .bind(i64::from(overlap))
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let holders: Vec<(String, String)> = sqlx::query_as(
            "SELECT a.task_id, a.worker_id
             FROM assignments a
             JOIN tasks t ON t.id = a.task_id
             WHERE t.project_id = ?",
        )
        .bind(&project)
        .fetch_all(&self.pool)
        .await?;

        let mut by_task: HashMap<String, HashSet<Uuid>> = HashMap::new();
        for (task_id, worker_id) in holders {
            let worker_id = parse_uuid(&worker_id)?;
            by_task.entry(task_id).or_default().insert(worker_id);
        }

        rows.into_iter()
            .map(|row| {
                let assigned_workers = by_task.remove(&row.id).unwrap_or_default();
                Ok(TaskCoverage {
                    task: Task {
                        id: parse_uuid(&row.id)?,
                        project_id: parse_uuid(&row.project_id)?,
                        required_tag: row.required_tag,
                        created_at: parse_datetime(&row.created_at)?,
                    },
                    active_coverage: u32::try_from(row.coverage).unwrap_or(0),
                    assigned_workers,
                })
            })
            .collect()
    }

    async fn pool_verified_tags(&self, project_id: Uuid) -> DomainResult<HashMap<Uuid, HashSet<String>>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT g.worker_id, g.tag
             FROM expertise_grants g
             JOIN pool_memberships m ON m.worker_id = g.worker_id
             WHERE m.project_id = ? AND m.active = 1 AND g.status = 'verified'",
        )
        .bind(project_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut tags: HashMap<Uuid, HashSet<String>> = HashMap::new();
        for (worker_id, tag) in rows {
            tags.entry(parse_uuid(&worker_id)?).or_default().insert(tag);
        }
        Ok(tags)
    }

    async fn pool_open_loads(&self, project_id: Uuid) -> DomainResult<HashMap<Uuid, u32>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT a.worker_id, COUNT(*)
             FROM assignments a
             JOIN pool_memberships m ON m.worker_id = a.worker_id
             WHERE m.project_id = ? AND m.active = 1
               AND a.status IN ('assigned', 'in_progress')
             GROUP BY a.worker_id",
        )
        .bind(project_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(worker_id, count)| Ok((parse_uuid(&worker_id)?, u32::try_from(count).unwrap_or(u32::MAX))))
            .collect()
    }

    async fn insert_assignment(&self, assignment: &Assignment) -> DomainResult<InsertOutcome> {
        let result = sqlx::query(
            "INSERT INTO assignments
             (id, project_id, task_id, worker_id, status, assigned_at, due_at,
              started_at, completed_at, expired_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .bind(assignment.id.to_string())
        .bind(assignment.project_id.to_string())
        .bind(assignment.task_id.to_string())
        .bind(assignment.worker_id.to_string())
        .bind(assignment.status.as_str())
        .bind(format_datetime(&assignment.assigned_at))
        .bind(format_datetime(&assignment.due_at))
        .bind(assignment.started_at.as_ref().map(format_datetime))
        .bind(assignment.completed_at.as_ref().map(format_datetime))
        .bind(assignment.expired_at.as_ref().map(format_datetime))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(InsertOutcome::Created),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                tracing::debug!(
                    task_id = %assignment.task_id,
                    worker_id = %assignment.worker_id,
                    "assignment already exists for pair"
                );
                Ok(InsertOutcome::Conflict)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_assignment(&self, id: Uuid) -> DomainResult<Option<Assignment>> {
        let row: Option<AssignmentRow> =
            sqlx::query_as(&format!("SELECT {ASSIGNMENT_COLUMNS} FROM assignments WHERE id = ?"))
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await?;
        row.map(row_to_assignment).transpose()
    }

    async fn list_assignments(&self, filter: AssignmentFilter) -> DomainResult<Vec<Assignment>> {
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {ASSIGNMENT_COLUMNS} FROM assignments WHERE 1 = 1"));

        if let Some(project_id) = filter.project_id {
            query.push(" AND project_id = ").push_bind(project_id.to_string());
        }
        if let Some(task_id) = filter.task_id {
            query.push(" AND task_id = ").push_bind(task_id.to_string());
        }
        if let Some(worker_id) = filter.worker_id {
            query.push(" AND worker_id = ").push_bind(worker_id.to_string());
        }
        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status.as_str());
        }
        query.push(" ORDER BY assigned_at, id");

        let rows: Vec<AssignmentRow> = query.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(row_to_assignment).collect()
    }

    async fn overdue_assignments(
        &self,
        now: DateTime<Utc>,
        project_id: Option<Uuid>,
    ) -> DomainResult<Vec<OverdueCandidate>> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT id, project_id, task_id, worker_id, status, due_at
             FROM assignments
             WHERE status IN ('assigned', 'in_progress') AND due_at < ",
        );
        query.push_bind(format_datetime(&now));
        if let Some(project_id) = project_id {
            query.push(" AND project_id = ").push_bind(project_id.to_string());
        }
        query.push(" ORDER BY due_at, id");

        let rows: Vec<OverdueRow> = query.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(decode_overdue).collect())
    }

    async fn expire_assignment(&self, id: Uuid, at: DateTime<Utc>) -> DomainResult<bool> {
        let result = sqlx::query(
            "UPDATE assignments SET status = 'expired', expired_at = ?
             WHERE id = ? AND status IN ('assigned', 'in_progress')",
        )
        .bind(format_datetime(&at))
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn transition_assignment(
        &self,
        id: Uuid,
        from: AssignmentStatus,
        to: AssignmentStatus,
        at: DateTime<Utc>,
    ) -> DomainResult<bool> {
        let column = timestamp_column(to)?;
        let sql = format!("UPDATE assignments SET status = ?, {column} = ? WHERE id = ? AND status = ?");

        let result = sqlx::query(&sql)
            .bind(to.as_str())
            .bind(format_datetime(&at))
            .bind(id.to_string())
            .bind(from.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn try_acquire_project_lease(
        &self,
        project_id: Uuid,
        holder: Uuid,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> DomainResult<bool> {
        let result = sqlx::query(
            "INSERT INTO project_leases (project_id, holder, acquired_at, expires_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(project_id) DO UPDATE
                SET holder = excluded.holder,
                    acquired_at = excluded.acquired_at,
                    expires_at = excluded.expires_at
              WHERE project_leases.expires_at <= ?3 OR project_leases.holder = ?2",
        )
        .bind(project_id.to_string())
        .bind(holder.to_string())
        .bind(format_datetime(&now))
        .bind(format_datetime(&(now + ttl)))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn release_project_lease(&self, project_id: Uuid, holder: Uuid) -> DomainResult<()> {
        sqlx::query("DELETE FROM project_leases WHERE project_id = ? AND holder = ?")
            .bind(project_id.to_string())
            .bind(holder.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
