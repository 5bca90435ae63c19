//! Implementation of the `annotask overlap` command.

use anyhow::{Context, Result};
use clap::Args;
use uuid::Uuid;

use crate::cli::context::AppContext;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{Config, OverlapResult};

#[derive(Args, Debug)]
pub struct OverlapArgs {
    /// Project ID
    pub project: Uuid,
}

#[derive(Debug, serde::Serialize)]
pub struct OverlapOutput {
    pub project_id: Uuid,
    #[serde(flatten)]
    pub result: OverlapResult,
}

impl CommandOutput for OverlapOutput {
    fn to_human(&self) -> String {
        format!(
            "Project {}\n  Overlap target:   {}\n  Pool size:        {}\n  Eligible workers: {}",
            self.project_id, self.result.overlap, self.result.total_workers, self.result.eligible_workers
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: OverlapArgs, config: &Config, json_mode: bool) -> Result<()> {
    let ctx = AppContext::open(config).await?;
    let result = ctx
        .engine()?
        .calculate_optimal_overlap(args.project)
        .await
        .context("Failed to calculate overlap")?;

    output(
        &OverlapOutput {
            project_id: args.project,
            result,
        },
        json_mode,
    );
    Ok(())
}
