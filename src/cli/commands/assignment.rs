//! Assignment commands: worker actions and listing.

use anyhow::{anyhow, Context, Result};
use clap::{Args, Subcommand};
use uuid::Uuid;

use crate::cli::context::AppContext;
use crate::cli::output::{output, short_id, table, CommandOutput};
use crate::domain::models::{Assignment, AssignmentFilter, AssignmentStatus, Config};
use crate::domain::ports::AssignmentStore;

#[derive(Args, Debug)]
pub struct AssignmentArgs {
    #[command(subcommand)]
    pub command: AssignmentCommands,
}

#[derive(Subcommand, Debug)]
pub enum AssignmentCommands {
    /// Mark an assignment as started
    Start {
        /// Assignment ID
        id: Uuid,
    },
    /// Mark an assignment as completed
    Complete {
        /// Assignment ID
        id: Uuid,
    },
    /// List assignments
    List {
        /// Filter by project
        #[arg(long)]
        project: Option<Uuid>,
        /// Filter by worker
        #[arg(long)]
        worker: Option<Uuid>,
        /// Filter by status (assigned, in_progress, completed, expired)
        #[arg(short, long)]
        status: Option<String>,
        /// Maximum number of rows to display
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },
}

#[derive(Debug, serde::Serialize)]
pub struct AssignmentActionOutput {
    pub success: bool,
    pub message: String,
    pub assignment: Assignment,
}

impl CommandOutput for AssignmentActionOutput {
    fn to_human(&self) -> String {
        self.message.clone()
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct AssignmentListOutput {
    pub assignments: Vec<Assignment>,
    pub total: usize,
}

impl CommandOutput for AssignmentListOutput {
    fn to_human(&self) -> String {
        if self.assignments.is_empty() {
            return "No assignments found.".to_string();
        }
        let mut t = table(["ID", "PROJECT", "TASK", "WORKER", "STATUS", "DUE"]);
        for a in &self.assignments {
            t.add_row(vec![
                short_id(&a.id),
                short_id(&a.project_id),
                short_id(&a.task_id),
                short_id(&a.worker_id),
                a.status.to_string(),
                a.due_at.format("%Y-%m-%d %H:%M").to_string(),
            ]);
        }
        format!("{t}\nShowing {} of {} assignment(s)", self.assignments.len(), self.total)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: AssignmentArgs, config: &Config, json_mode: bool) -> Result<()> {
    let ctx = AppContext::open(config).await?;

    match args.command {
        AssignmentCommands::Start { id } => {
            let assignment = ctx.lifecycle().start(id).await.context("Failed to start assignment")?;
            let out = AssignmentActionOutput {
                success: true,
                message: format!("Assignment {id} started"),
                assignment,
            };
            output(&out, json_mode);
        }
        AssignmentCommands::Complete { id } => {
            let assignment = ctx
                .lifecycle()
                .complete(id)
                .await
                .context("Failed to complete assignment")?;
            let out = AssignmentActionOutput {
                success: true,
                message: format!("Assignment {id} completed"),
                assignment,
            };
            output(&out, json_mode);
        }
        AssignmentCommands::List {
            project,
            worker,
            status,
            limit,
        } => {
            let status = match status {
                Some(s) => Some(AssignmentStatus::from_str(&s).ok_or_else(|| anyhow!("Invalid status: {s}"))?),
                None => None,
            };
            let filter = AssignmentFilter {
                project_id: project,
                worker_id: worker,
                status,
                ..Default::default()
            };
            let mut assignments = ctx
                .assignment_store()
                .list_assignments(filter)
                .await
                .context("Failed to list assignments")?;
            let total = assignments.len();
            assignments.truncate(limit);
            output(&AssignmentListOutput { assignments, total }, json_mode);
        }
    }
    Ok(())
}
