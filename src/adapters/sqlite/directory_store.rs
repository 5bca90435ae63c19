//! SQLite adapter for DirectoryStore.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::adapters::sqlite::{format_datetime, parse_datetime, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    ApprovalStatus, ExperienceTier, ExpertiseGrant, ExpertiseTag, PoolMembership, Project, Task,
    Worker,
};
use crate::domain::ports::DirectoryStore;

#[derive(Clone)]
pub struct SqliteDirectoryStore {
    pool: SqlitePool,
}

impl SqliteDirectoryStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ProjectRow {
    id: String,
    title: String,
    created_at: String,
}

fn row_to_project(row: ProjectRow) -> DomainResult<Project> {
    Ok(Project {
        id: parse_uuid(&row.id)?,
        title: row.title,
        created_at: parse_datetime(&row.created_at)?,
    })
}

#[derive(sqlx::FromRow)]
pub(crate) struct WorkerRow {
    pub id: String,
    pub email: String,
    pub status: String,
    pub tier: String,
    pub created_at: String,
}

pub(crate) fn row_to_worker(row: WorkerRow) -> DomainResult<Worker> {
    let status = ApprovalStatus::from_str(&row.status).ok_or_else(|| {
        DomainError::SerializationError(format!("unknown worker status: {}", row.status))
    })?;

    Ok(Worker {
        id: parse_uuid(&row.id)?,
        email: row.email,
        status,
        tier: ExperienceTier::from_str(&row.tier).unwrap_or_default(),
        created_at: parse_datetime(&row.created_at)?,
    })
}

#[derive(sqlx::FromRow)]
struct MembershipRow {
    project_id: String,
    worker_id: String,
    active: bool,
    joined_at: String,
}

fn row_to_membership(row: MembershipRow) -> DomainResult<PoolMembership> {
    Ok(PoolMembership {
        project_id: parse_uuid(&row.project_id)?,
        worker_id: parse_uuid(&row.worker_id)?,
        active: row.active,
        joined_at: parse_datetime(&row.joined_at)?,
    })
}

#[async_trait]
impl DirectoryStore for SqliteDirectoryStore {
    async fn upsert_project(&self, project: &Project) -> DomainResult<()> {
        sqlx::query(
            "INSERT INTO projects (id, title, created_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET title = excluded.title",
        )
        .bind(project.id.to_string())
        .bind(&project.title)
        .bind(format_datetime(&project.created_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_project(&self, id: Uuid) -> DomainResult<Option<Project>> {
        let row: Option<ProjectRow> = sqlx::query_as("SELECT id, title, created_at FROM projects WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_project).transpose()
    }

    async fn list_projects(&self) -> DomainResult<Vec<Project>> {
        let rows: Vec<ProjectRow> =
            sqlx::query_as("SELECT id, title, created_at FROM projects ORDER BY created_at, id")
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(row_to_project).collect()
    }

    async fn upsert_worker(&self, worker: &Worker) -> DomainResult<()> {
        sqlx::query(
            "INSERT INTO workers (id, email, status, tier, created_at) VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                email = excluded.email, status = excluded.status, tier = excluded.tier",
        )
        .bind(worker.id.to_string())
        .bind(&worker.email)
        .bind(worker.status.as_str())
        .bind(worker.tier.as_str())
        .bind(format_datetime(&worker.created_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_worker(&self, id: Uuid) -> DomainResult<Option<Worker>> {
        let row: Option<WorkerRow> =
            sqlx::query_as("SELECT id, email, status, tier, created_at FROM workers WHERE id = ?")
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await?;
        row.map(row_to_worker).transpose()
    }

    async fn find_worker_by_email(&self, email: &str) -> DomainResult<Option<Worker>> {
        let row: Option<WorkerRow> =
            sqlx::query_as("SELECT id, email, status, tier, created_at FROM workers WHERE email = ?")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
        row.map(row_to_worker).transpose()
    }

    async fn upsert_membership(&self, membership: &PoolMembership) -> DomainResult<()> {
        sqlx::query(
            "INSERT INTO pool_memberships (project_id, worker_id, active, joined_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(project_id, worker_id) DO UPDATE SET active = excluded.active",
        )
        .bind(membership.project_id.to_string())
        .bind(membership.worker_id.to_string())
        .bind(membership.active)
        .bind(format_datetime(&membership.joined_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_membership(&self, project_id: Uuid, worker_id: Uuid) -> DomainResult<Option<PoolMembership>> {
        let row: Option<MembershipRow> = sqlx::query_as(
            "SELECT project_id, worker_id, active, joined_at FROM pool_memberships
             WHERE project_id = ? AND worker_id = ?",
        )
        .bind(project_id.to_string())
        .bind(worker_id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_membership).transpose()
    }

    async fn deactivate_membership(&self, project_id: Uuid, worker_id: Uuid) -> DomainResult<bool> {
        let result = sqlx::query(
            "UPDATE pool_memberships SET active = 0
             WHERE project_id = ? AND worker_id = ? AND active = 1",
        )
        .bind(project_id.to_string())
        .bind(worker_id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_task(&self, task: &Task) -> DomainResult<()> {
        sqlx::query("INSERT INTO tasks (id, project_id, required_tag, created_at) VALUES (?1, ?2, ?3, ?4)")
            .bind(task.id.to_string())
            .bind(task.project_id.to_string())
            .bind(&task.required_tag)
            .bind(format_datetime(&task.created_at))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn upsert_tag(&self, tag: &ExpertiseTag) -> DomainResult<()> {
        sqlx::query(
            "INSERT INTO expertise_tags (slug, name, active) VALUES (?1, ?2, ?3)
             ON CONFLICT(slug) DO UPDATE SET name = excluded.name, active = excluded.active",
        )
        .bind(&tag.slug)
        .bind(&tag.name)
        .bind(tag.active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_grant(&self, grant: &ExpertiseGrant) -> DomainResult<()> {
        sqlx::query(
            "INSERT INTO expertise_grants (worker_id, tag, status, granted_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(worker_id, tag) DO UPDATE SET status = excluded.status, granted_at = excluded.granted_at",
        )
        .bind(grant.worker_id.to_string())
        .bind(&grant.tag)
        .bind(grant.status.as_str())
        .bind(format_datetime(&grant.granted_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
