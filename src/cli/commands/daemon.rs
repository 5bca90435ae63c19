//! Implementation of the `annotask daemon` command.
//!
//! Runs the timeout daemon and the reassignment reactor in one process
//! until Ctrl-C. Pool changes recorded by other commands reach the reactor
//! through the pool change relay.

use anyhow::{Context, Result};
use clap::Args;
use std::sync::Arc;
use std::time::Duration;

use crate::cli::context::AppContext;
use crate::domain::models::Config;
use crate::services::{TimeoutDaemon, TimeoutDaemonConfig, TimeoutDaemonEvent};

#[derive(Args, Debug)]
pub struct DaemonArgs {
    /// Override the configured sweep interval (seconds)
    #[arg(long)]
    pub interval: Option<u64>,

    /// Wait one interval before the first sweep
    #[arg(long)]
    pub no_initial_sweep: bool,
}

pub async fn execute(args: DaemonArgs, config: &Config, json_mode: bool) -> Result<()> {
    let ctx = AppContext::open(config).await?;
    let bus = Arc::new(ctx.event_bus());
    let relay = ctx.pool_change_relay(bus.clone());
    let reactor = ctx.reactor()?;
    let processor = Arc::new(ctx.timeout_processor(reactor.clone()));

    let mut daemon_config = TimeoutDaemonConfig::from(&config.sweep);
    if let Some(secs) = args.interval {
        daemon_config.sweep_interval = Duration::from_secs(secs.max(1));
    }
    daemon_config.run_on_startup = !args.no_initial_sweep;

    // Changes made while no daemon ran are covered by one resync.
    relay
        .seek_to_latest()
        .await
        .context("Failed to read the pool change log")?;
    let reactor_task = reactor.start(&bus);
    let relay_task = relay.start();
    match reactor.resync().await {
        Ok(outcomes) => tracing::info!(projects = outcomes.len(), "startup resync finished"),
        Err(e) => tracing::warn!(error = %e, "startup resync failed"),
    }

    let daemon = TimeoutDaemon::new(processor, daemon_config);
    let handle = daemon.handle();
    let mut events = daemon.run();

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                let stopped = matches!(event, TimeoutDaemonEvent::Stopped { .. });
                report(&event, json_mode);
                if stopped {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupt received, shutting down");
                handle.stop();
            }
        }
    }

    relay.stop();
    reactor.stop();
    let _ = tokio::time::timeout(Duration::from_secs(3), relay_task).await;
    let _ = tokio::time::timeout(Duration::from_secs(3), reactor_task).await;
    let status = handle.status().await;
    tracing::info!(
        runs = status.total_runs,
        failed = status.failed_runs,
        expired = status.total_expired,
        backfilled = status.total_backfilled,
        reactor = ?reactor.stats(),
        relay = ?relay.stats(),
        "daemon exited"
    );
    Ok(())
}

fn report(event: &TimeoutDaemonEvent, json_mode: bool) {
    match event {
        TimeoutDaemonEvent::Started => {
            if !json_mode {
                println!("Timeout daemon started. Press Ctrl-C to stop.");
            }
        }
        TimeoutDaemonEvent::SweepCompleted {
            run_number,
            report,
            duration_ms,
        } => {
            if json_mode {
                let line = serde_json::json!({
                    "event": "sweep_completed",
                    "run": run_number,
                    "durationMs": duration_ms,
                    "report": report,
                });
                println!("{line}");
            } else {
                println!(
                    "Sweep #{run_number}: {} expired, {} backfilled, {} failures ({duration_ms} ms)",
                    report.expired,
                    report.backfilled(),
                    report.failures.len()
                );
            }
        }
        TimeoutDaemonEvent::SweepFailed { run_number, error } => {
            if json_mode {
                println!("{}", serde_json::json!({ "event": "sweep_failed", "run": run_number, "error": error }));
            } else {
                eprintln!("Sweep #{run_number} failed: {error}");
            }
        }
        TimeoutDaemonEvent::Stopped { reason } => {
            if !json_mode {
                println!("Timeout daemon stopped ({reason:?}).");
            }
        }
    }
}
