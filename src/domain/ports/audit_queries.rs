//! Read-only diagnostics port backing the integrity auditor.
//!
//! Every method takes an optional project scope; `None` covers all projects.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{
    AuditCounts, DuplicatePair, ExpertiseSummary, IdleMember, PoolSize, TaskCoverageCount,
    WorkerWorkload,
};

#[async_trait]
pub trait AuditQueries: Send + Sync {
    /// Inventory counts. `multi_covered_tasks` is left for the auditor.
    async fn inventory_counts(&self, scope: Option<Uuid>) -> DomainResult<AuditCounts>;

    /// (task, worker) pairs with more than one row in {assigned, in_progress, completed}.
    async fn duplicate_active_pairs(&self, scope: Option<Uuid>) -> DomainResult<Vec<DuplicatePair>>;

    /// Active coverage of every task, zero-coverage tasks included.
    async fn coverage_counts(&self, scope: Option<Uuid>) -> DomainResult<Vec<TaskCoverageCount>>;

    async fn idle_pool_members(&self, scope: Option<Uuid>) -> DomainResult<Vec<IdleMember>>;

    async fn pool_sizes(&self, scope: Option<Uuid>) -> DomainResult<Vec<PoolSize>>;

    /// Workers ordered by total assignments, busiest first.
    async fn worker_workloads(&self, scope: Option<Uuid>, limit: usize) -> DomainResult<Vec<WorkerWorkload>>;

    async fn expertise_summary(&self) -> DomainResult<ExpertiseSummary>;
}
