//! Audit report artifact and the read models the auditor is built from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Issue severity. Critical issues are genuine invariant violations;
/// warnings and info point at capacity or coverage problems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditIssue {
    pub severity: Severity,
    pub message: String,
    #[serde(default)]
    pub details: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditCounts {
    pub projects: u64,
    pub tasks: u64,
    pub workers: u64,
    pub approved_workers: u64,
    pub assignments: u64,
    pub active_memberships: u64,
    /// Tasks intentionally covered by two or more workers.
    pub multi_covered_tasks: u64,
    pub assignments_by_status: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlapBucket {
    pub overlap: u32,
    pub task_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolSize {
    pub project_id: Uuid,
    pub title: String,
    pub active_members: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerWorkload {
    pub worker_id: Uuid,
    pub email: String,
    pub total: u64,
    pub assigned: u64,
    pub in_progress: u64,
    pub completed: u64,
    pub expired: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpertiseSummary {
    pub active_tags: u64,
    pub verified_grants: u64,
    pub verified_by_tag: BTreeMap<String, u64>,
}

/// Two or more active rows for the same (task, worker) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicatePair {
    pub task_id: Uuid,
    pub worker_id: Uuid,
    pub rows: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCoverageCount {
    pub task_id: Uuid,
    pub project_id: Uuid,
    pub coverage: u64,
}

/// An active pool member holding no assignment in that project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdleMember {
    pub project_id: Uuid,
    pub worker_id: Uuid,
    pub email: String,
}

/// Structured output of one audit run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    pub generated_at: DateTime<Utc>,
    pub project_id: Option<Uuid>,
    pub counts: AuditCounts,
    pub overlap_distribution: Vec<OverlapBucket>,
    pub issues: Vec<AuditIssue>,
    pub pool_sizes: Vec<PoolSize>,
    pub top_workers: Vec<WorkerWorkload>,
    pub expertise: ExpertiseSummary,
    pub recommendations: Vec<String>,
}

impl AuditReport {
    pub fn issues_with(&self, severity: Severity) -> impl Iterator<Item = &AuditIssue> {
        self.issues.iter().filter(move |i| i.severity == severity)
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.issues_with(severity).count()
    }

    pub fn has_critical(&self) -> bool {
        self.count(Severity::Critical) > 0
    }
}
