//! Domain errors for the annotask assignment engine.

use thiserror::Error;
use uuid::Uuid;

/// Domain-level errors that can occur while assigning, sweeping or auditing.
///
/// Expected outcomes (an empty pool, a task nobody is qualified for, a
/// duplicate insert) are not errors; they are reported through
/// `AssignmentStatus` and `InsertOutcome`. Only unexpected faults end up here.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Project not found: {0}")]
    ProjectNotFound(Uuid),

    #[error("Worker not found: {0}")]
    WorkerNotFound(Uuid),

    #[error("Task not found: {0}")]
    TaskNotFound(Uuid),

    #[error("Assignment not found: {0}")]
    AssignmentNotFound(Uuid),

    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition { from: String, to: String, reason: String },

    #[error("Assignment conflict: task {task_id} is already assigned to worker {worker_id}")]
    AssignmentConflict { task_id: Uuid, worker_id: Uuid },

    #[error("Project {0} is busy: another process holds its assignment lease")]
    ProjectBusy(Uuid),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}
