//! Command-line interface.

pub mod commands;
pub mod context;
pub mod output;

use clap::{Parser, Subcommand};

use commands::{
    assign::AssignArgs, assignment::AssignmentArgs, audit::AuditArgs, daemon::DaemonArgs,
    import::ImportArgs, init::InitArgs, overlap::OverlapArgs, pool::PoolArgs, sweep::SweepArgs,
};

#[derive(Parser, Debug)]
#[command(name = "annotask")]
#[command(about = "Adaptive overlap assignment for annotation projects", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write default configuration and create the database
    Init(InitArgs),
    /// Show the overlap target for a project
    Overlap(OverlapArgs),
    /// Top up a project's tasks to the overlap target
    Assign(AssignArgs),
    /// Expire overdue assignments and backfill affected projects
    Sweep(SweepArgs),
    /// Report on assignment distribution and integrity
    Audit(AuditArgs),
    /// Change project pool membership
    Pool(PoolArgs),
    /// Start, complete or list assignments
    Assignment(AssignmentArgs),
    /// Load projects, workers, expertise and tasks from YAML
    Import(ImportArgs),
    /// Run the timeout daemon and reassignment reactor until interrupted
    Daemon(DaemonArgs),
}

/// Print an error in the requested format and exit non-zero.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    if json_mode {
        let chain: Vec<String> = err.chain().skip(1).map(ToString::to_string).collect();
        let body = serde_json::json!({
            "success": false,
            "error": err.to_string(),
            "causes": chain,
        });
        eprintln!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("{} {err:#}", console::style("error:").red().bold());
    }
    std::process::exit(1);
}
