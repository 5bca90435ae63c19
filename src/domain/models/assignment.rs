//! Assignment domain model and its state machine.
//!
//! ```text
//! assigned ──► in_progress ──► completed
//!    │              │
//!    └──────┬───────┘
//!           ▼
//!        expired
//! ```
//!
//! `completed` and `expired` are terminal. Only the timeout sweep moves a
//! row to `expired`; worker actions drive the other transitions.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Assigned,
    InProgress,
    Completed,
    Expired,
}

impl Default for AssignmentStatus {
    fn default() -> Self {
        Self::Assigned
    }
}

impl AssignmentStatus {
    pub const ALL: [Self; 4] = [Self::Assigned, Self::InProgress, Self::Completed, Self::Expired];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Assigned => "assigned",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Expired => "expired",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "assigned" => Some(Self::Assigned),
            "in_progress" | "in-progress" => Some(Self::InProgress),
            "completed" | "complete" => Some(Self::Completed),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Expired)
    }

    /// Still waiting on the worker; these rows can time out.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Assigned | Self::InProgress)
    }

    /// Counts toward a task's active coverage.
    pub fn counts_toward_coverage(&self) -> bool {
        !matches!(self, Self::Expired)
    }

    pub fn valid_transitions(&self) -> Vec<AssignmentStatus> {
        match self {
            Self::Assigned => vec![Self::InProgress, Self::Completed, Self::Expired],
            Self::InProgress => vec![Self::Completed, Self::Expired],
            Self::Completed | Self::Expired => vec![],
        }
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        self.valid_transitions().contains(&new_status)
    }
}

impl std::fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: Uuid,
    pub project_id: Uuid,
    pub task_id: Uuid,
    pub worker_id: Uuid,
    pub status: AssignmentStatus,
    pub assigned_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub expired_at: Option<DateTime<Utc>>,
}

impl Assignment {
    /// A fresh `assigned` row due `timeout` after `now`.
    pub fn new(
        project_id: Uuid,
        task_id: Uuid,
        worker_id: Uuid,
        now: DateTime<Utc>,
        timeout: Duration,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id,
            task_id,
            worker_id,
            status: AssignmentStatus::Assigned,
            assigned_at: now,
            due_at: now + timeout,
            started_at: None,
            completed_at: None,
            expired_at: None,
        }
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status.is_open() && self.due_at < now
    }
}

/// Result of inserting an assignment row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Created,
    /// The (task, worker) pair already has a row. Treated as a no-op.
    Conflict,
}

/// Minimal projection of an overdue row, snapshotted at sweep start.
#[derive(Debug, Clone, PartialEq)]
pub struct OverdueAssignment {
    pub id: Uuid,
    pub project_id: Uuid,
    pub task_id: Uuid,
    pub worker_id: Uuid,
    pub status: AssignmentStatus,
    pub due_at: DateTime<Utc>,
}

/// A row matched by the overdue query that could not be decoded.
///
/// Ids are kept when they parse so the failure can still be attributed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnreadableRow {
    pub assignment_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub error: String,
}

/// One entry of the overdue snapshot. Decoding is per row so a single bad
/// row cannot hide its siblings.
pub type OverdueCandidate = Result<OverdueAssignment, UnreadableRow>;

/// Filters for listing assignments.
#[derive(Debug, Clone, Default)]
pub struct AssignmentFilter {
    pub project_id: Option<Uuid>,
    pub task_id: Option<Uuid>,
    pub worker_id: Option<Uuid>,
    pub status: Option<AssignmentStatus>,
}
