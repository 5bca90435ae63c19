//! Implementation of the `annotask audit` command.

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use std::path::PathBuf;
use uuid::Uuid;

use crate::cli::context::AppContext;
use crate::cli::output::{output, short_id, table, truncate, CommandOutput};
use crate::domain::models::{AuditReport, Config, Severity};
use crate::services::integrity_auditor::{write_report_json, DEFAULT_TOP_WORKERS};

#[derive(Args, Debug)]
pub struct AuditArgs {
    /// Limit the audit to one project
    #[arg(long)]
    pub project: Option<Uuid>,

    /// Also write the report as JSON to this file
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// How many of the busiest workers to list
    #[arg(long, default_value_t = DEFAULT_TOP_WORKERS)]
    pub top: usize,
}

#[derive(Debug, serde::Serialize)]
pub struct AuditOutput {
    #[serde(flatten)]
    pub report: AuditReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub written_to: Option<PathBuf>,
}

impl CommandOutput for AuditOutput {
    fn to_human(&self) -> String {
        let r = &self.report;
        let c = &r.counts;
        let mut lines = vec![
            style("Assignment audit").bold().to_string(),
            format!(
                "Projects {} | Tasks {} | Workers {} ({} approved) | Assignments {} | Active memberships {}",
                c.projects, c.tasks, c.workers, c.approved_workers, c.assignments, c.active_memberships
            ),
        ];
        let by_status: Vec<String> = c
            .assignments_by_status
            .iter()
            .map(|(status, n)| format!("{status}={n}"))
            .collect();
        lines.push(format!("By status: {}", by_status.join(", ")));
        lines.push(format!("Tasks covered by more than one worker: {}", c.multi_covered_tasks));

        if !r.overlap_distribution.is_empty() {
            let mut t = table(["OVERLAP", "TASKS"]);
            for b in &r.overlap_distribution {
                t.add_row(vec![b.overlap.to_string(), b.task_count.to_string()]);
            }
            lines.push(String::new());
            lines.push(t.to_string());
        }

        if !r.pool_sizes.is_empty() {
            let mut t = table(["PROJECT", "TITLE", "ACTIVE MEMBERS"]);
            for p in &r.pool_sizes {
                t.add_row(vec![short_id(&p.project_id), truncate(&p.title, 30), p.active_members.to_string()]);
            }
            lines.push(t.to_string());
        }

        if !r.top_workers.is_empty() {
            let mut t = table(["WORKER", "TOTAL", "ASSIGNED", "IN PROGRESS", "COMPLETED", "EXPIRED"]);
            for w in &r.top_workers {
                t.add_row(vec![
                    truncate(&w.email, 32),
                    w.total.to_string(),
                    w.assigned.to_string(),
                    w.in_progress.to_string(),
                    w.completed.to_string(),
                    w.expired.to_string(),
                ]);
            }
            lines.push(t.to_string());
        }

        lines.push(format!(
            "Expertise: {} active tags, {} verified grants",
            r.expertise.active_tags, r.expertise.verified_grants
        ));

        // Critical first, then warnings, then info.
        for severity in [Severity::Critical, Severity::Warning, Severity::Info] {
            for issue in r.issues_with(severity) {
                let label = match severity {
                    Severity::Critical => style("CRITICAL").red().bold(),
                    Severity::Warning => style("WARNING").yellow(),
                    Severity::Info => style("INFO").cyan(),
                };
                lines.push(format!("{label} {}", issue.message));
            }
        }
        if r.issues.is_empty() {
            lines.push(style("No issues found.").green().to_string());
        }

        for rec in &r.recommendations {
            lines.push(format!("-> {rec}"));
        }
        if let Some(path) = &self.written_to {
            lines.push(format!("Report written to {}", path.display()));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: AuditArgs, config: &Config, json_mode: bool) -> Result<()> {
    let ctx = AppContext::open(config).await?;
    let report = ctx
        .auditor()
        .with_top_workers(args.top)
        .audit(args.project)
        .await
        .context("Audit failed")?;

    if let Some(path) = &args.output {
        write_report_json(&report, path)
            .await
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
    }

    output(
        &AuditOutput {
            report,
            written_to: args.output,
        },
        json_mode,
    );
    Ok(())
}
