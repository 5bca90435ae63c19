//! SQLite adapter for AuditQueries.
//!
//! Scoped queries bind the project id once as `?1` and filter with
//! `(?1 IS NULL OR ...)`, so the unscoped audit runs the same SQL.

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::adapters::sqlite::{parse_uuid, to_count};
use crate::domain::errors::DomainResult;
use crate::domain::models::{
    AssignmentStatus, AuditCounts, DuplicatePair, ExpertiseSummary, IdleMember, PoolSize,
    TaskCoverageCount, WorkerWorkload,
};
use crate::domain::ports::AuditQueries;

#[derive(Clone)]
pub struct SqliteAuditQueries {
    pool: SqlitePool,
}

impl SqliteAuditQueries {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn scalar(&self, sql: &str, scope: &Option<String>) -> DomainResult<u64> {
        let (n,): (i64,) = sqlx::query_as(sql).bind(scope).fetch_one(&self.pool).await?;
        Ok(to_count(n))
    }
}

#[derive(sqlx::FromRow)]
struct WorkloadRow {
    worker_id: String,
    email: String,
    total: i64,
    assigned: i64,
    in_progress: i64,
    completed: i64,
    expired: i64,
}

#[derive(sqlx::FromRow)]
struct PoolSizeRow {
    id: String,
    title: String,
    active_members: i64,
}

#[async_trait]
impl AuditQueries for SqliteAuditQueries {
    async fn inventory_counts(&self, scope: Option<Uuid>) -> DomainResult<AuditCounts> {
        let scope = scope.map(|id| id.to_string());

        let projects = self
            .scalar("SELECT COUNT(*) FROM projects WHERE (?1 IS NULL OR id = ?1)", &scope)
            .await?;
        let tasks = self
            .scalar("SELECT COUNT(*) FROM tasks WHERE (?1 IS NULL OR project_id = ?1)", &scope)
            .await?;
        let assignments = self
            .scalar("SELECT COUNT(*) FROM assignments WHERE (?1 IS NULL OR project_id = ?1)", &scope)
            .await?;
        let active_memberships = self
            .scalar(
                "SELECT COUNT(*) FROM pool_memberships WHERE active = 1 AND (?1 IS NULL OR project_id = ?1)",
                &scope,
            )
            .await?;

        let (workers, approved): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(CASE WHEN status = 'approved' THEN 1 ELSE 0 END), 0)
             FROM workers w
             WHERE ?1 IS NULL
                OR EXISTS (SELECT 1 FROM pool_memberships m WHERE m.worker_id = w.id AND m.project_id = ?1)",
        )
        .bind(&scope)
        .fetch_one(&self.pool)
        .await?;

        let by_status: Vec<(String, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM assignments
             WHERE (?1 IS NULL OR project_id = ?1)
             GROUP BY status",
        )
        .bind(&scope)
        .fetch_all(&self.pool)
        .await?;

        let mut assignments_by_status: BTreeMap<String, u64> = AssignmentStatus::ALL
            .iter()
            .map(|s| (s.as_str().to_string(), 0))
            .collect();
        for (status, n) in by_status {
            assignments_by_status.insert(status, to_count(n));
        }

        Ok(AuditCounts {
            projects,
            tasks,
            workers: to_count(workers),
            approved_workers: to_count(approved),
            assignments,
            active_memberships,
            multi_covered_tasks: 0,
            assignments_by_status,
        })
    }

    async fn duplicate_active_pairs(&self, scope: Option<Uuid>) -> DomainResult<Vec<DuplicatePair>> {
        let rows: Vec<(String, String, i64)> = sqlx::query_as(
            "SELECT task_id, worker_id, COUNT(*) AS n
             FROM assignments
             WHERE status IN ('assigned', 'in_progress', 'completed')
               AND (?1 IS NULL OR project_id = ?1)
             GROUP BY task_id, worker_id
             HAVING COUNT(*) > 1
             ORDER BY task_id, worker_id",
        )
        .bind(scope.map(|id| id.to_string()))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(task_id, worker_id, n)| {
                Ok(DuplicatePair {
                    task_id: parse_uuid(&task_id)?,
                    worker_id: parse_uuid(&worker_id)?,
                    rows: to_count(n),
                })
            })
            .collect()
    }

    async fn coverage_counts(&self, scope: Option<Uuid>) -> DomainResult<Vec<TaskCoverageCount>> {
        let rows: Vec<(String, String, i64)> = sqlx::query_as(
            "SELECT t.id, t.project_id,
                    COALESCE(SUM(CASE WHEN a.status IN ('assigned', 'in_progress', 'completed')
                                      THEN 1 ELSE 0 END), 0)
             FROM tasks t
             LEFT JOIN assignments a ON a.task_id = t.id
             WHERE (?1 IS NULL OR t.project_id = ?1)
             GROUP BY t.id
             ORDER BY t.created_at, t.id",
        )
        .bind(scope.map(|id| id.to_string()))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(task_id, project_id, coverage)| {
                Ok(TaskCoverageCount {
                    task_id: parse_uuid(&task_id)?,
                    project_id: parse_uuid(&project_id)?,
                    coverage: to_count(coverage),
                })
            })
            .collect()
    }

    async fn idle_pool_members(&self, scope: Option<Uuid>) -> DomainResult<Vec<IdleMember>> {
        let rows: Vec<(String, String, String)> = sqlx::query_as(
            "SELECT m.project_id, m.worker_id, w.email
             FROM pool_memberships m
             JOIN workers w ON w.id = m.worker_id
             WHERE m.active = 1
               AND (?1 IS NULL OR m.project_id = ?1)
               AND NOT EXISTS (
                   SELECT 1 FROM assignments a
                   WHERE a.worker_id = m.worker_id AND a.project_id = m.project_id
               )
             ORDER BY m.project_id, m.joined_at",
        )
        .bind(scope.map(|id| id.to_string()))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(project_id, worker_id, email)| {
                Ok(IdleMember {
                    project_id: parse_uuid(&project_id)?,
                    worker_id: parse_uuid(&worker_id)?,
                    email,
                })
            })
            .collect()
    }

    async fn pool_sizes(&self, scope: Option<Uuid>) -> DomainResult<Vec<PoolSize>> {
        let rows: Vec<PoolSizeRow> = sqlx::query_as(
            "SELECT p.id, p.title,
                    COALESCE(SUM(CASE WHEN m.active = 1 THEN 1 ELSE 0 END), 0) AS active_members
             FROM projects p
             LEFT JOIN pool_memberships m ON m.project_id = p.id
             WHERE (?1 IS NULL OR p.id = ?1)
             GROUP BY p.id
             ORDER BY active_members DESC, p.title",
        )
        .bind(scope.map(|id| id.to_string()))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(PoolSize {
                    project_id: parse_uuid(&row.id)?,
                    title: row.title,
                    active_members: to_count(row.active_members),
                })
            })
            .collect()
    }

    async fn worker_workloads(&self, scope: Option<Uuid>, limit: usize) -> DomainResult<Vec<WorkerWorkload>> {
        let rows: Vec<WorkloadRow> = sqlx::query_as(
            "SELECT w.id AS worker_id, w.email,
                    COUNT(*) AS total,
                    SUM(CASE WHEN a.status = 'assigned' THEN 1 ELSE 0 END) AS assigned,
                    SUM(CASE WHEN a.status = 'in_progress' THEN 1 ELSE 0 END) AS in_progress,
                    SUM(CASE WHEN a.status = 'completed' THEN 1 ELSE 0 END) AS completed,
                    SUM(CASE WHEN a.status = 'expired' THEN 1 ELSE 0 END) AS expired
             FROM assignments a
             JOIN workers w ON w.id = a.worker_id
             WHERE (?1 IS NULL OR a.project_id = ?1)
             GROUP BY w.id
             ORDER BY total DESC, w.email
             LIMIT ?2",
        )
        .bind(scope.map(|id| id.to_string()))
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(WorkerWorkload {
                    worker_id: parse_uuid(&row.worker_id)?,
                    email: row.email,
                    total: to_count(row.total),
                    assigned: to_count(row.assigned),
                    in_progress: to_count(row.in_progress),
                    completed: to_count(row.completed),
                    expired: to_count(row.expired),
                })
            })
            .collect()
    }

    async fn expertise_summary(&self) -> DomainResult<ExpertiseSummary> {
        let (active_tags,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM expertise_tags WHERE active = 1")
            .fetch_one(&self.pool)
            .await?;

        let by_tag: Vec<(String, i64)> = sqlx::query_as(
            "SELECT tag, COUNT(*) FROM expertise_grants
             WHERE status = 'verified'
             GROUP BY tag
             ORDER BY tag",
        )
        .fetch_all(&self.pool)
        .await?;

        let verified_by_tag: BTreeMap<String, u64> =
            by_tag.into_iter().map(|(tag, n)| (tag, to_count(n))).collect();

        Ok(ExpertiseSummary {
            active_tags: to_count(active_tags),
            verified_grants: verified_by_tag.values().sum(),
            verified_by_tag,
        })
    }
}
