//! Distribution and integrity auditor.
//!
//! Read-only diagnostics over the store. Produces an [`AuditReport`] with
//! inventory counts, a coverage histogram and a list of issues:
//!
//! | check                                   | severity |
//! |-----------------------------------------|----------|
//! | duplicate active (task, worker) pairs   | critical |
//! | task coverage above the overlap ceiling | warning  |
//! | pool member with no assignments         | warning  |
//! | no verified expertise at all            | warning  |
//! | task with zero active coverage          | info     |

use chrono::Utc;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{
    AuditIssue, AuditReport, OverlapBucket, Severity, TaskCoverageCount, MAX_OVERLAP,
};
use crate::domain::ports::AuditQueries;

pub const DEFAULT_TOP_WORKERS: usize = 10;

/// Approved workers needed for full overlap everywhere.
const FULL_OVERLAP_WORKERS: u64 = MAX_OVERLAP as u64;

pub struct IntegrityAuditor<Q: AuditQueries> {
    queries: Arc<Q>,
    top_workers: usize,
}

impl<Q: AuditQueries> IntegrityAuditor<Q> {
    pub fn new(queries: Arc<Q>) -> Self {
        Self {
            queries,
            top_workers: DEFAULT_TOP_WORKERS,
        }
    }

    pub fn with_top_workers(mut self, n: usize) -> Self {
        self.top_workers = n;
        self
    }

    /// Build the report, optionally scoped to one project.
    #[instrument(skip(self))]
    pub async fn audit(&self, project_id: Option<Uuid>) -> DomainResult<AuditReport> {
        let mut counts = self.queries.inventory_counts(project_id).await?;
        let duplicates = self.queries.duplicate_active_pairs(project_id).await?;
        let coverage = self.queries.coverage_counts(project_id).await?;
        let idle = self.queries.idle_pool_members(project_id).await?;
        let pool_sizes = self.queries.pool_sizes(project_id).await?;
        let top_workers = self.queries.worker_workloads(project_id, self.top_workers).await?;
        let expertise = self.queries.expertise_summary().await?;

        counts.multi_covered_tasks = coverage.iter().filter(|c| c.coverage > 1).count() as u64;

        let mut issues = Vec::new();

        if !duplicates.is_empty() {
            issues.push(AuditIssue {
                severity: Severity::Critical,
                message: format!("{} duplicate active (task, worker) pairs", duplicates.len()),
                details: json!({ "pairs": duplicates }),
            });
        }

        let over: Vec<&TaskCoverageCount> =
            coverage.iter().filter(|c| c.coverage > u64::from(MAX_OVERLAP)).collect();
        if !over.is_empty() {
            issues.push(AuditIssue {
                severity: Severity::Warning,
                message: format!("{} tasks covered by more than {MAX_OVERLAP} workers", over.len()),
                details: json!({ "tasks": over }),
            });
        }

        if !idle.is_empty() {
            issues.push(AuditIssue {
                severity: Severity::Warning,
                message: format!("{} pool members have no assignments in their project", idle.len()),
                details: json!({ "members": idle }),
            });
        }

        if expertise.verified_grants == 0 {
            issues.push(AuditIssue {
                severity: Severity::Warning,
                message: "No verified expertise grants".to_string(),
                details: json!({ "activeTags": expertise.active_tags }),
            });
        }

        let uncovered: Vec<Uuid> = coverage.iter().filter(|c| c.coverage == 0).map(|c| c.task_id).collect();
        if !uncovered.is_empty() {
            issues.push(AuditIssue {
                severity: Severity::Info,
                message: format!("{} tasks have no active assignments", uncovered.len()),
                details: json!({ "taskIds": uncovered }),
            });
        }

        let mut recommendations = Vec::new();
        if counts.approved_workers < FULL_OVERLAP_WORKERS {
            recommendations.push(format!(
                "Need at least {FULL_OVERLAP_WORKERS} approved workers for full {MAX_OVERLAP}-way overlap"
            ));
        }
        if !duplicates.is_empty() {
            recommendations.push("Fix duplicate assignments immediately".to_string());
        }
        if expertise.verified_grants == 0 {
            recommendations.push("Set up expertise tags and verify worker skills".to_string());
        }

        let report = AuditReport {
            generated_at: Utc::now(),
            project_id,
            counts,
            overlap_distribution: histogram(&coverage),
            issues,
            pool_sizes,
            top_workers,
            expertise,
            recommendations,
        };

        tracing::info!(
            critical = report.count(Severity::Critical),
            warnings = report.count(Severity::Warning),
            info = report.count(Severity::Info),
            "audit finished"
        );
        Ok(report)
    }
}

/// Tasks per active-coverage count, ascending.
fn histogram(coverage: &[TaskCoverageCount]) -> Vec<OverlapBucket> {
    let mut buckets: BTreeMap<u64, u64> = BTreeMap::new();
    for c in coverage {
        *buckets.entry(c.coverage).or_insert(0) += 1;
    }
    buckets
        .into_iter()
        .map(|(overlap, task_count)| OverlapBucket {
            overlap: u32::try_from(overlap).unwrap_or(u32::MAX),
            task_count,
        })
        .collect()
}

/// Write the report as pretty JSON.
pub async fn write_report_json(report: &AuditReport, path: &Path) -> std::io::Result<()> {
    let body = serde_json::to_vec_pretty(report)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    tokio::fs::write(path, body).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cov(coverage: u64) -> TaskCoverageCount {
        TaskCoverageCount {
            task_id: Uuid::new_v4(),
            project_id: Uuid::nil(),
            coverage,
        }
    }

    #[test]
    fn test_histogram_groups_by_coverage() {
        let buckets = histogram(&[cov(0), cov(3), cov(3), cov(1), cov(3)]);
        assert_eq!(
            buckets,
            vec![
                OverlapBucket { overlap: 0, task_count: 1 },
                OverlapBucket { overlap: 1, task_count: 1 },
                OverlapBucket { overlap: 3, task_count: 3 },
            ]
        );
    }

    #[test]
    fn test_histogram_of_nothing_is_empty() {
        assert!(histogram(&[]).is_empty());
    }
}
