//! Overlap policy and the typed results of an assignment pass.

use serde::{Deserialize, Serialize};

/// Upper bound on distinct workers per task.
pub const MAX_OVERLAP: u32 = 3;

/// Target number of distinct workers per task for a pool of `total_workers`.
///
/// A capped step function: 1 for an empty or single-member pool, 2 for a
/// pair, [`MAX_OVERLAP`] from three members on. Never exceeds the pool size
/// once the pool is non-empty.
pub fn overlap_for_pool_size(total_workers: u32) -> u32 {
    let step = match total_workers {
        0 | 1 => 1,
        2 => 2,
        _ => MAX_OVERLAP,
    };
    step.min(total_workers.max(1))
}

/// Output of `calculate_optimal_overlap`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlapResult {
    pub overlap: u32,
    pub total_workers: u32,
    pub eligible_workers: u32,
}

/// Status of one `adaptive_assign_project_tasks` pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatusKind {
    /// The project's pool is empty.
    NoAnnotators,
    /// At least one assignment row was created.
    Assigned,
    /// Nothing was created and some tagged task had no qualified worker.
    NoEligible,
    /// Nothing left to do for the current pool and task set.
    AlreadySatisfied,
}

impl AssignmentStatusKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoAnnotators => "no_annotators",
            Self::Assigned => "assigned",
            Self::NoEligible => "no_eligible",
            Self::AlreadySatisfied => "already_satisfied",
        }
    }
}

impl std::fmt::Display for AssignmentStatusKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of `adaptive_assign_project_tasks`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentResult {
    pub status: AssignmentStatusKind,
    pub message: String,
    pub created_count: u32,
    pub overlap: u32,
    pub total_workers: u32,
    pub eligible_workers: u32,
    /// Tasks below target coverage when the pass started.
    pub deficient_tasks: u32,
    /// Tagged tasks for which no worker held a verified grant.
    pub no_eligible_tasks: u32,
    /// Inserts rejected by the (task, worker) uniqueness constraint.
    pub conflicts: u32,
}

impl AssignmentResult {
    pub fn no_annotators() -> Self {
        Self {
            status: AssignmentStatusKind::NoAnnotators,
            message: "No active annotators in the project pool".to_string(),
            created_count: 0,
            overlap: overlap_for_pool_size(0),
            total_workers: 0,
            eligible_workers: 0,
            deficient_tasks: 0,
            no_eligible_tasks: 0,
            conflicts: 0,
        }
    }
}
