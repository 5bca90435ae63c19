//! Annotation task domain model.
//!
//! A task is the unit of labeling work inside a project. Its content and
//! labeling semantics live elsewhere; the engine only needs the project it
//! belongs to and the expertise it requires, if any.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub project_id: Uuid,
    /// Slug of the expertise tag a worker must hold a verified grant for.
    pub required_tag: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn new(project_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id,
            required_tag: None,
            created_at: Utc::now(),
        }
    }

    pub fn requiring(mut self, tag: impl Into<String>) -> Self {
        self.required_tag = Some(tag.into());
        self
    }
}

/// A task whose active coverage is below the project's overlap target.
#[derive(Debug, Clone)]
pub struct TaskCoverage {
    pub task: Task,
    /// Assignments in {assigned, in_progress, completed}.
    pub active_coverage: u32,
    /// Every worker holding a row for this task, expired rows included.
    /// The (task, worker) pair is unique, so none of them can be picked again.
    pub assigned_workers: HashSet<Uuid>,
}

impl TaskCoverage {
    /// Number of additional workers needed to reach `overlap`.
    pub fn shortfall(&self, overlap: u32) -> u32 {
        overlap.saturating_sub(self.active_coverage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shortfall_saturates() {
        let coverage = TaskCoverage {
            task: Task::new(Uuid::new_v4()),
            active_coverage: 4,
            assigned_workers: HashSet::new(),
        };
        assert_eq!(coverage.shortfall(3), 0);

        let coverage = TaskCoverage {
            active_coverage: 1,
            ..coverage
        };
        assert_eq!(coverage.shortfall(3), 2);
    }

    #[test]
    fn test_requiring_sets_tag() {
        let task = Task::new(Uuid::new_v4()).requiring("radiology");
        assert_eq!(task.required_tag.as_deref(), Some("radiology"));
    }
}
