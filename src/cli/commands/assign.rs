//! Implementation of the `annotask assign` command.

use anyhow::{Context, Result};
use clap::Args;
use uuid::Uuid;

use crate::cli::context::AppContext;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{AssignmentResult, Config};

#[derive(Args, Debug)]
pub struct AssignArgs {
    /// Project ID
    pub project: Uuid,
}

#[derive(Debug, serde::Serialize)]
pub struct AssignOutput {
    pub project_id: Uuid,
    #[serde(flatten)]
    pub result: AssignmentResult,
}

impl CommandOutput for AssignOutput {
    fn to_human(&self) -> String {
        let r = &self.result;
        let mut lines = vec![
            format!("[{}] {}", r.status, r.message),
            format!("  Overlap: {} (pool {}, eligible {})", r.overlap, r.total_workers, r.eligible_workers),
            format!("  Created: {}", r.created_count),
        ];
        if r.deficient_tasks > 0 {
            lines.push(format!("  Under-covered tasks at start: {}", r.deficient_tasks));
        }
        if r.no_eligible_tasks > 0 {
            lines.push(format!("  Tasks without a qualified worker: {}", r.no_eligible_tasks));
        }
        if r.conflicts > 0 {
            lines.push(format!("  Skipped existing pairs: {}", r.conflicts));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: AssignArgs, config: &Config, json_mode: bool) -> Result<()> {
    let ctx = AppContext::open(config).await?;
    let result = ctx
        .engine()?
        .adaptive_assign_project_tasks(args.project)
        .await
        .context("Assignment pass failed")?;

    output(
        &AssignOutput {
            project_id: args.project,
            result,
        },
        json_mode,
    );
    Ok(())
}
