//! Repository port used by the engine, the reactor and the timeout sweep.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{
    Assignment, AssignmentFilter, AssignmentStatus, InsertOutcome, OverdueCandidate, PoolMember,
    TaskCoverage,
};

/// Typed access to pool membership, coverage and assignment rows.
///
/// Implementations hold no business rules; they answer the questions the
/// engine asks and apply single-row, compare-and-set mutations.
#[async_trait]
pub trait AssignmentStore: Send + Sync {
    /// Active pool members of a project with their worker records,
    /// regardless of approval status.
    async fn active_pool_members(&self, project_id: Uuid) -> DomainResult<Vec<PoolMember>>;

    /// Every project that currently has at least one active member.
    async fn projects_with_active_pool(&self) -> DomainResult<Vec<Uuid>>;

    /// Tasks of a project whose active coverage is below `overlap`.
    async fn deficient_tasks(&self, project_id: Uuid, overlap: u32) -> DomainResult<Vec<TaskCoverage>>;

    /// Verified expertise tags held by each active member of the project's pool.
    async fn pool_verified_tags(&self, project_id: Uuid) -> DomainResult<HashMap<Uuid, HashSet<String>>>;

    /// Open (assigned + in_progress) assignments per active pool member,
    /// counted across all projects. Members with no open rows are absent.
    async fn pool_open_loads(&self, project_id: Uuid) -> DomainResult<HashMap<Uuid, u32>>;

    /// Insert a new row. A (task, worker) uniqueness violation yields
    /// `InsertOutcome::Conflict` instead of an error.
    async fn insert_assignment(&self, assignment: &Assignment) -> DomainResult<InsertOutcome>;

    async fn get_assignment(&self, id: Uuid) -> DomainResult<Option<Assignment>>;

    async fn list_assignments(&self, filter: AssignmentFilter) -> DomainResult<Vec<Assignment>>;

    /// Rows in {assigned, in_progress} with `due_at < now`, oldest first.
    /// Only the query itself can fail; rows that do not decode come back
    /// as `Err(UnreadableRow)` entries.
    async fn overdue_assignments(
        &self,
        now: DateTime<Utc>,
        project_id: Option<Uuid>,
    ) -> DomainResult<Vec<OverdueCandidate>>;

    /// Move an open row to `expired`. Returns false when the row was no
    /// longer open (completed or expired in the meantime).
    async fn expire_assignment(&self, id: Uuid, at: DateTime<Utc>) -> DomainResult<bool>;

    /// Compare-and-set `from -> to`, stamping the matching timestamp column.
    /// Returns false when the row was not in `from`.
    async fn transition_assignment(
        &self,
        id: Uuid,
        from: AssignmentStatus,
        to: AssignmentStatus,
        at: DateTime<Utc>,
    ) -> DomainResult<bool>;

    /// Take the project's lease for `holder` unless another holder has an
    /// unexpired one. Visible to every process sharing the database.
    async fn try_acquire_project_lease(
        &self,
        project_id: Uuid,
        holder: Uuid,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> DomainResult<bool>;

    /// Drop the lease if `holder` still owns it.
    async fn release_project_lease(&self, project_id: Uuid, holder: Uuid) -> DomainResult<()>;
}
