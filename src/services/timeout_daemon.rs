//! Timeout sweep background daemon.
//!
//! Runs [`TimeoutProcessor::run_sweep`] on a fixed interval until stopped
//! or until too many consecutive sweeps fail.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify, RwLock};
use tokio::time::{interval, Instant, MissedTickBehavior};

use crate::domain::models::{SweepConfig, SweepReport};
use crate::domain::ports::AssignmentStore;
use crate::services::timeout_processor::{SweepHandle, TimeoutProcessor};

/// Configuration for the timeout daemon.
#[derive(Debug, Clone)]
pub struct TimeoutDaemonConfig {
    /// Interval between sweeps.
    pub sweep_interval: Duration,
    /// Whether to sweep immediately on startup.
    pub run_on_startup: bool,
    /// Maximum consecutive failures before stopping.
    pub max_consecutive_failures: u32,
}

impl Default for TimeoutDaemonConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(3600),
            run_on_startup: true,
            max_consecutive_failures: 5,
        }
    }
}

impl From<&SweepConfig> for TimeoutDaemonConfig {
    fn from(config: &SweepConfig) -> Self {
        Self {
            sweep_interval: Duration::from_secs(config.interval_secs),
            ..Self::default()
        }
    }
}

/// Event emitted by the daemon.
#[derive(Debug, Clone)]
pub enum TimeoutDaemonEvent {
    Started,
    SweepCompleted {
        run_number: u64,
        report: SweepReport,
        duration_ms: u64,
    },
    SweepFailed {
        run_number: u64,
        error: String,
    },
    Stopped { reason: StopReason },
}

/// Reason the daemon stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    Requested,
    TooManyFailures,
}

#[derive(Debug, Clone, Default)]
pub struct DaemonStatus {
    pub running: bool,
    pub total_runs: u64,
    pub successful_runs: u64,
    pub failed_runs: u64,
    pub last_run: Option<Instant>,
    pub total_expired: u64,
    pub total_backfilled: u64,
}

/// Handle to control the daemon.
#[derive(Clone)]
pub struct DaemonHandle {
    stop_flag: Arc<AtomicBool>,
    wake: Arc<Notify>,
    sweep: SweepHandle,
    status: Arc<RwLock<DaemonStatus>>,
}

impl DaemonHandle {
    /// Stop the daemon and cancel any sweep in flight.
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::Release);
        self.sweep.stop();
        self.wake.notify_one();
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop_flag.load(Ordering::Acquire)
    }

    pub async fn status(&self) -> DaemonStatus {
        self.status.read().await.clone()
    }
}

pub struct TimeoutDaemon<S: AssignmentStore + 'static> {
    processor: Arc<TimeoutProcessor<S>>,
    config: TimeoutDaemonConfig,
    status: Arc<RwLock<DaemonStatus>>,
    stop_flag: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl<S: AssignmentStore + 'static> TimeoutDaemon<S> {
    pub fn new(processor: Arc<TimeoutProcessor<S>>, config: TimeoutDaemonConfig) -> Self {
        Self {
            processor,
            config,
            status: Arc::new(RwLock::new(DaemonStatus::default())),
            stop_flag: Arc::new(AtomicBool::new(false)),
            wake: Arc::new(Notify::new()),
        }
    }

    pub fn handle(&self) -> DaemonHandle {
        DaemonHandle {
            stop_flag: self.stop_flag.clone(),
            wake: self.wake.clone(),
            sweep: self.processor.handle(),
            status: self.status.clone(),
        }
    }

    /// Spawn the daemon, returning a channel for events.
    pub fn run(self) -> mpsc::Receiver<TimeoutDaemonEvent> {
        let (tx, rx) = mpsc::channel(100);
        tokio::spawn(async move {
            self.run_loop(tx).await;
        });
        rx
    }

    async fn run_loop(self, tx: mpsc::Sender<TimeoutDaemonEvent>) {
        self.status.write().await.running = true;
        let _ = tx.send(TimeoutDaemonEvent::Started).await;
        tracing::info!(interval_secs = self.config.sweep_interval.as_secs(), "timeout daemon started");

        let mut consecutive_failures = 0u32;
        let mut timer = interval(self.config.sweep_interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        timer.tick().await;

        if self.config.run_on_startup {
            self.run_cycle(&tx, &mut consecutive_failures).await;
        }

        let reason = loop {
            if self.stop_flag.load(Ordering::Acquire) {
                break StopReason::Requested;
            }
            if consecutive_failures >= self.config.max_consecutive_failures {
                break StopReason::TooManyFailures;
            }

            tokio::select! {
                _ = timer.tick() => {
                    if self.stop_flag.load(Ordering::Acquire) {
                        break StopReason::Requested;
                    }
                    self.run_cycle(&tx, &mut consecutive_failures).await;
                }
                () = self.wake.notified() => {}
            }
        };

        self.status.write().await.running = false;
        tracing::info!(reason = ?reason, "timeout daemon stopped");
        let _ = tx.send(TimeoutDaemonEvent::Stopped { reason }).await;
    }

    async fn run_cycle(&self, tx: &mpsc::Sender<TimeoutDaemonEvent>, consecutive_failures: &mut u32) {
        let run_number = {
            let mut status = self.status.write().await;
            status.total_runs += 1;
            status.total_runs
        };

        let start = Instant::now();
        let result = self.processor.run_sweep(None).await;
        let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        match result {
            Ok(report) => {
                *consecutive_failures = 0;
                {
                    let mut status = self.status.write().await;
                    status.successful_runs += 1;
                    status.last_run = Some(Instant::now());
                    status.total_expired += report.expired as u64;
                    status.total_backfilled += u64::from(report.backfilled());
                }
                let _ = tx
                    .send(TimeoutDaemonEvent::SweepCompleted {
                        run_number,
                        report,
                        duration_ms,
                    })
                    .await;
            }
            Err(e) => {
                *consecutive_failures += 1;
                self.status.write().await.failed_runs += 1;
                tracing::error!(run_number, error = %e, "timeout sweep failed");
                let _ = tx
                    .send(TimeoutDaemonEvent::SweepFailed {
                        run_number,
                        error: e.to_string(),
                    })
                    .await;
            }
        }
    }
}
