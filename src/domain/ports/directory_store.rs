//! Repository port for data owned by collaborators.
//!
//! Projects, workers, pool memberships, tasks and the expertise taxonomy are
//! produced outside the engine. This port is how that data lands in the
//! store (imports, operator commands, test fixtures).

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{
    ExpertiseGrant, ExpertiseTag, PoolMembership, Project, Task, Worker,
};

#[async_trait]
pub trait DirectoryStore: Send + Sync {
    async fn upsert_project(&self, project: &Project) -> DomainResult<()>;

    async fn get_project(&self, id: Uuid) -> DomainResult<Option<Project>>;

    async fn list_projects(&self) -> DomainResult<Vec<Project>>;

    async fn upsert_worker(&self, worker: &Worker) -> DomainResult<()>;

    async fn get_worker(&self, id: Uuid) -> DomainResult<Option<Worker>>;

    async fn find_worker_by_email(&self, email: &str) -> DomainResult<Option<Worker>>;

    /// Create or update the (project, worker) membership. An existing row
    /// keeps its original `joined_at`.
    async fn upsert_membership(&self, membership: &PoolMembership) -> DomainResult<()>;

    async fn get_membership(&self, project_id: Uuid, worker_id: Uuid) -> DomainResult<Option<PoolMembership>>;

    /// Flip `active` to false. Returns false when there was no active row.
    async fn deactivate_membership(&self, project_id: Uuid, worker_id: Uuid) -> DomainResult<bool>;

    async fn insert_task(&self, task: &Task) -> DomainResult<()>;

    async fn upsert_tag(&self, tag: &ExpertiseTag) -> DomainResult<()>;

    async fn upsert_grant(&self, grant: &ExpertiseGrant) -> DomainResult<()>;
}
