//! Pool membership commands.
//!
//! Each change is appended to the pool change log, where a running daemon
//! picks it up, and is also handled by an in-process reassignment reactor
//! before the command returns.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Args, Subcommand};
use uuid::Uuid;

use crate::cli::context::AppContext;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{AssignmentResult, Config, PoolMembership};
use crate::domain::ports::{DirectoryStore, PoolChangeLog};
use crate::services::{MembershipChange, PoolMembershipChanged};

#[derive(Args, Debug)]
pub struct PoolArgs {
    #[command(subcommand)]
    pub command: PoolCommands,
}

#[derive(Subcommand, Debug)]
pub enum PoolCommands {
    /// Add a worker to a project's pool (or reactivate them)
    Join {
        /// Project ID
        project: Uuid,
        /// Worker ID
        worker: Uuid,
    },
    /// Remove a worker from a project's pool. Existing assignments are kept.
    Leave {
        /// Project ID
        project: Uuid,
        /// Worker ID
        worker: Uuid,
    },
}

#[derive(Debug, serde::Serialize)]
pub struct PoolChangeOutput {
    pub project_id: Uuid,
    pub worker_id: Uuid,
    pub change: MembershipChange,
    pub sequence: u64,
    pub top_up: Option<AssignmentResult>,
}

impl CommandOutput for PoolChangeOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![format!(
            "Worker {} {} project {} (change #{})",
            self.worker_id,
            match self.change {
                MembershipChange::Joined => "joined",
                MembershipChange::Left => "left",
                MembershipChange::Updated => "updated in",
            },
            self.project_id,
            self.sequence
        )];
        match &self.top_up {
            Some(r) => lines.push(format!("Top-up: [{}] {} ({} created)", r.status, r.message, r.created_count)),
            None => lines.push("Top-up deferred.".to_string()),
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: PoolArgs, config: &Config, json_mode: bool) -> Result<()> {
    let ctx = AppContext::open(config).await?;
    let directory = ctx.directory();

    let (project_id, worker_id, event) = match args.command {
        PoolCommands::Join { project, worker } => {
            ensure_exists(&directory, project, worker).await?;
            directory
                .upsert_membership(&PoolMembership::new(project, worker))
                .await
                .context("Failed to add pool membership")?;
            (project, worker, PoolMembershipChanged::joined(project, worker))
        }
        PoolCommands::Leave { project, worker } => {
            let changed = directory
                .deactivate_membership(project, worker)
                .await
                .context("Failed to remove pool membership")?;
            if !changed {
                bail!("Worker {worker} is not an active member of project {project}");
            }
            (project, worker, PoolMembershipChanged::left(project, worker))
        }
    };

    let change = event.change;
    let sequence = ctx
        .pool_change_log()
        .append_pool_change(project_id, Some(worker_id), change, Utc::now())
        .await
        .context("Failed to record pool change")?;

    let bus = ctx.event_bus();
    let reactor = ctx.reactor()?;
    let mut events = bus.subscribe();
    bus.publish(event);
    let received = events.recv().await.context("Pool event bus closed")?;
    let top_up = reactor
        .handle_event(&received)
        .await
        .context("Top-up after pool change failed")?;

    output(
        &PoolChangeOutput {
            project_id,
            worker_id,
            change,
            sequence,
            top_up,
        },
        json_mode,
    );
    Ok(())
}

async fn ensure_exists<D: DirectoryStore>(directory: &D, project: Uuid, worker: Uuid) -> Result<()> {
    if directory.get_project(project).await?.is_none() {
        bail!("Project not found: {project}");
    }
    if directory.get_worker(worker).await?.is_none() {
        bail!("Worker not found: {worker}");
    }
    Ok(())
}
