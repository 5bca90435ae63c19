//! Implementation of the `annotask sweep` command.
//!
//! Row failures, and a failed overdue snapshot, are part of the report and
//! never change the exit status.

use anyhow::Result;
use chrono::Utc;
use clap::Args;
use uuid::Uuid;

use crate::cli::context::AppContext;
use crate::cli::output::{output, short_id, table, CommandOutput};
use crate::domain::models::{Config, SweepReport};
use crate::domain::ports::AssignmentStore;
use crate::services::TimeoutProcessor;

#[derive(Args, Debug)]
pub struct SweepArgs {
    /// Only sweep this project
    #[arg(long)]
    pub project: Option<Uuid>,
}

#[derive(Debug, serde::Serialize)]
pub struct SweepOutput {
    #[serde(flatten)]
    pub report: SweepReport,
}

impl CommandOutput for SweepOutput {
    fn to_human(&self) -> String {
        let r = &self.report;
        if let Some(failure) = r.snapshot_failure() {
            return format!("Sweep could not read overdue assignments: {}", failure.error);
        }
        let mut lines = vec![format!(
            "Sweep finished: {} overdue, {} expired, {} skipped, {} failed, {} backfilled",
            r.candidates,
            r.expired,
            r.skipped,
            r.row_failures(),
            r.backfilled()
        )];
        if r.cancelled {
            lines.push("Sweep was cancelled before all rows were visited.".to_string());
        }

        if !r.backfills.is_empty() {
            let mut t = table(["PROJECT", "STATUS", "CREATED"]);
            for b in &r.backfills {
                t.add_row(vec![
                    short_id(&b.project_id),
                    b.status.map_or_else(|| "deferred".to_string(), |s| s.to_string()),
                    b.created_count.to_string(),
                ]);
            }
            lines.push(t.to_string());
        }

        for f in &r.failures {
            let row = f.assignment_id.map_or_else(|| "-".to_string(), |id| short_id(&id));
            let project = f.project_id.map_or_else(|| "?".to_string(), |id| short_id(&id));
            lines.push(format!("  {:?} failure [{}] {}: {}", f.stage, project, row, f.error));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: SweepArgs, config: &Config, json_mode: bool) -> Result<()> {
    let ctx = AppContext::open(config).await?;
    let processor = ctx.timeout_processor(ctx.reactor()?);
    let report = run(&processor, args.project).await;
    output(&SweepOutput { report }, json_mode);
    Ok(())
}

/// Run one sweep; a failed snapshot becomes a report entry.
pub async fn run<S: AssignmentStore + 'static>(processor: &TimeoutProcessor<S>, project: Option<Uuid>) -> SweepReport {
    let started_at = Utc::now();
    match processor.run_sweep_at(started_at, project).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!(error = %e, "failed to read overdue assignments");
            SweepReport::snapshot_failed(started_at, project, e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{create_migrated_test_pool, SqliteAssignmentStore};
    use crate::domain::models::SweepStage;
    use crate::services::{AssignmentEngine, ReassignmentReactor};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_unreadable_snapshot_is_reported_not_raised() {
        let pool = create_migrated_test_pool().await.unwrap();
        let store = Arc::new(SqliteAssignmentStore::new(pool.clone()));
        let processor = TimeoutProcessor::new(ReassignmentReactor::new(Arc::new(AssignmentEngine::new(store))));
        sqlx::query("DROP TABLE assignments").execute(&pool).await.unwrap();

        let project = Uuid::new_v4();
        let report = run(&processor, Some(project)).await;
        let failure = report.snapshot_failure().unwrap();
        assert_eq!(failure.stage, SweepStage::Snapshot);
        assert_eq!(failure.project_id, Some(project));
        assert_eq!(report.candidates, 0);

        let text = SweepOutput { report }.to_human();
        assert!(text.starts_with("Sweep could not read overdue assignments"));
    }
}
