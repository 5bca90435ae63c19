//! Timeout sweep report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::overlap::AssignmentStatusKind;

/// Where in the sweep a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepStage {
    /// The overdue query itself failed; nothing was visited.
    Snapshot,
    Expire,
    Backfill,
}

/// A row or project that could not be processed. Recorded, never raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepFailure {
    pub stage: SweepStage,
    pub assignment_id: Option<Uuid>,
    /// Unknown when the row's project id does not decode.
    pub project_id: Option<Uuid>,
    pub error: String,
}

/// Outcome of the single backfill attempt a project gets per sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackfillOutcome {
    pub project_id: Uuid,
    /// `None` when the reactor was suspended and deferred the top-up.
    pub status: Option<AssignmentStatusKind>,
    pub created_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub project_filter: Option<Uuid>,
    pub candidates: usize,
    pub expired: usize,
    /// Rows that left {assigned, in_progress} between snapshot and expiry.
    pub skipped: usize,
    pub failures: Vec<SweepFailure>,
    pub backfills: Vec<BackfillOutcome>,
    pub cancelled: bool,
}

impl SweepReport {
    pub fn new(started_at: DateTime<Utc>, project_filter: Option<Uuid>) -> Self {
        Self {
            started_at,
            finished_at: started_at,
            project_filter,
            candidates: 0,
            expired: 0,
            skipped: 0,
            failures: Vec::new(),
            backfills: Vec::new(),
            cancelled: false,
        }
    }

    pub fn visited(&self) -> usize {
        self.expired + self.skipped + self.row_failures()
    }

    pub fn row_failures(&self) -> usize {
        self.failures
            .iter()
            .filter(|f| f.stage == SweepStage::Expire)
            .count()
    }

    pub fn backfilled(&self) -> u32 {
        self.backfills.iter().map(|b| b.created_count).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }

    /// Report for a sweep whose overdue snapshot could not be read.
    pub fn snapshot_failed(started_at: DateTime<Utc>, project_filter: Option<Uuid>, error: String) -> Self {
        let mut report = Self::new(started_at, project_filter);
        report.failures.push(SweepFailure {
            stage: SweepStage::Snapshot,
            assignment_id: None,
            project_id: project_filter,
            error,
        });
        report.finished_at = Utc::now();
        report
    }

    pub fn snapshot_failure(&self) -> Option<&SweepFailure> {
        self.failures.iter().find(|f| f.stage == SweepStage::Snapshot)
    }
}
