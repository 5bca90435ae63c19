//! Worker-driven assignment transitions.
//!
//! `start` and `complete` are the only transitions a worker can cause;
//! expiry belongs to the timeout sweep.

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Assignment, AssignmentStatus};
use crate::domain::ports::AssignmentStore;

pub struct AssignmentLifecycle<S: AssignmentStore> {
    store: Arc<S>,
}

impl<S: AssignmentStore> AssignmentLifecycle<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// assigned → in_progress
    pub async fn start(&self, assignment_id: Uuid) -> DomainResult<Assignment> {
        self.transition(assignment_id, AssignmentStatus::InProgress).await
    }

    /// assigned | in_progress → completed
    pub async fn complete(&self, assignment_id: Uuid) -> DomainResult<Assignment> {
        self.transition(assignment_id, AssignmentStatus::Completed).await
    }

    async fn transition(&self, assignment_id: Uuid, to: AssignmentStatus) -> DomainResult<Assignment> {
        let current = self
            .store
            .get_assignment(assignment_id)
            .await?
            .ok_or(DomainError::AssignmentNotFound(assignment_id))?;

        if !current.status.can_transition_to(to) {
            return Err(invalid(current.status, to));
        }

        let applied = self
            .store
            .transition_assignment(assignment_id, current.status, to, Utc::now())
            .await?;

        let updated = self
            .store
            .get_assignment(assignment_id)
            .await?
            .ok_or(DomainError::AssignmentNotFound(assignment_id))?;

        if !applied {
            // Lost a race, most likely against the timeout sweep.
            return Err(invalid(updated.status, to));
        }

        tracing::info!(
            assignment_id = %assignment_id,
            worker_id = %updated.worker_id,
            from = current.status.as_str(),
            to = to.as_str(),
            "assignment transitioned"
        );
        Ok(updated)
    }
}

fn invalid(from: AssignmentStatus, to: AssignmentStatus) -> DomainError {
    let reason = if from.is_terminal() {
        format!("assignment is already {from}")
    } else {
        format!("allowed: {:?}", from.valid_transitions())
    };
    DomainError::InvalidStateTransition {
        from: from.to_string(),
        to: to.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{create_migrated_test_pool, SqliteAssignmentStore, SqliteDirectoryStore};
    use crate::domain::models::{ApprovalStatus, Project, Task, Worker};
    use crate::domain::ports::DirectoryStore;
    use chrono::Duration;

    async fn setup() -> (AssignmentLifecycle<SqliteAssignmentStore>, Arc<SqliteAssignmentStore>, Assignment) {
        let pool = create_migrated_test_pool().await.unwrap();
        let directory = SqliteDirectoryStore::new(pool.clone());
        let store = Arc::new(SqliteAssignmentStore::new(pool));

        let project = Project::new("Lifecycle");
        let worker = Worker::new("w@example.com", ApprovalStatus::Approved);
        let task = Task::new(project.id);
        directory.upsert_project(&project).await.unwrap();
        directory.upsert_worker(&worker).await.unwrap();
        directory.insert_task(&task).await.unwrap();

        let row = Assignment::new(project.id, task.id, worker.id, Utc::now(), Duration::hours(1));
        store.insert_assignment(&row).await.unwrap();
        (AssignmentLifecycle::new(store.clone()), store, row)
    }

    #[tokio::test]
    async fn test_start_then_complete() {
        let (lifecycle, _, row) = setup().await;

        let started = lifecycle.start(row.id).await.unwrap();
        assert_eq!(started.status, AssignmentStatus::InProgress);
        assert!(started.started_at.is_some());

        let done = lifecycle.complete(row.id).await.unwrap();
        assert_eq!(done.status, AssignmentStatus::Completed);
        assert!(done.completed_at.is_some());

        let again = lifecycle.start(row.id).await;
        assert!(matches!(again, Err(DomainError::InvalidStateTransition { .. })));
    }

    #[tokio::test]
    async fn test_expired_assignment_cannot_complete() {
        let (lifecycle, store, row) = setup().await;
        store.expire_assignment(row.id, Utc::now()).await.unwrap();

        let err = lifecycle.complete(row.id).await.unwrap_err();
        assert!(err.to_string().contains("already expired"));
    }

    #[tokio::test]
    async fn test_unknown_assignment() {
        let (lifecycle, _, _) = setup().await;
        let missing = Uuid::new_v4();
        assert!(matches!(
            lifecycle.start(missing).await,
            Err(DomainError::AssignmentNotFound(id)) if id == missing
        ));
    }
}
