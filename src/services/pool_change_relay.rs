//! Pool change relay.
//!
//! Commands append every membership change to the pool change log in the
//! database. The relay polls that log and republishes new records on the
//! in-process [`PoolEventBus`], so a long-running daemon reacts to changes
//! made by other processes.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::{interval, MissedTickBehavior};

use crate::domain::errors::DomainResult;
use crate::domain::models::ReactorConfig;
use crate::domain::ports::PoolChangeLog;
use crate::services::event_bus::{PoolEventBus, PoolMembershipChanged};

pub const DEFAULT_RELAY_BATCH_SIZE: usize = 100;

#[derive(Debug, Clone)]
pub struct PoolChangeRelayConfig {
    pub poll_interval: Duration,
    pub batch_size: usize,
}

impl Default for PoolChangeRelayConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1000),
            batch_size: DEFAULT_RELAY_BATCH_SIZE,
        }
    }
}

impl From<&ReactorConfig> for PoolChangeRelayConfig {
    fn from(config: &ReactorConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RelayStats {
    pub cursor: u64,
    pub polls: u64,
    pub forwarded: u64,
    pub failed_polls: u64,
}

#[derive(Default)]
struct RelayState {
    cursor: AtomicU64,
    running: AtomicBool,
    polls: AtomicU64,
    forwarded: AtomicU64,
    failed_polls: AtomicU64,
}

pub struct PoolChangeRelay<L: PoolChangeLog + 'static> {
    log: Arc<L>,
    bus: Arc<PoolEventBus>,
    config: PoolChangeRelayConfig,
    state: Arc<RelayState>,
}

impl<L: PoolChangeLog + 'static> Clone for PoolChangeRelay<L> {
    fn clone(&self) -> Self {
        Self {
            log: self.log.clone(),
            bus: self.bus.clone(),
            config: self.config.clone(),
            state: self.state.clone(),
        }
    }
}

impl<L: PoolChangeLog + 'static> PoolChangeRelay<L> {
    pub fn new(log: Arc<L>, bus: Arc<PoolEventBus>, config: PoolChangeRelayConfig) -> Self {
        Self {
            log,
            bus,
            config: PoolChangeRelayConfig {
                batch_size: config.batch_size.max(1),
                ..config
            },
            state: Arc::new(RelayState::default()),
        }
    }

    /// Skip everything already in the log. Returns the new cursor.
    pub async fn seek_to_latest(&self) -> DomainResult<u64> {
        let latest = self.log.latest_pool_change().await?;
        self.state.cursor.store(latest, Ordering::SeqCst);
        tracing::debug!(cursor = latest, "pool change relay positioned at log head");
        Ok(latest)
    }

    /// Last sequence forwarded (or skipped).
    pub fn cursor(&self) -> u64 {
        self.state.cursor.load(Ordering::SeqCst)
    }

    /// Forward every record after the cursor. Returns how many were published.
    pub async fn poll_once(&self) -> DomainResult<usize> {
        self.state.polls.fetch_add(1, Ordering::Relaxed);
        let mut forwarded = 0usize;
        loop {
            let after = self.cursor();
            let records = self.log.pool_changes_after(after, self.config.batch_size).await?;
            for record in &records {
                self.bus.publish(PoolMembershipChanged::from(record));
                self.state.cursor.store(record.sequence, Ordering::SeqCst);
                forwarded += 1;
            }
            if records.len() < self.config.batch_size {
                break;
            }
        }
        if forwarded > 0 {
            self.state.forwarded.fetch_add(forwarded as u64, Ordering::Relaxed);
            tracing::debug!(forwarded, cursor = self.cursor(), "pool changes relayed");
        }
        Ok(forwarded)
    }

    /// Spawn the polling loop.
    pub fn start(&self) -> tokio::task::JoinHandle<()> {
        self.state.running.store(true, Ordering::SeqCst);
        let relay = self.clone();

        tokio::spawn(async move {
            tracing::info!(
                poll_interval_ms = u64::try_from(relay.config.poll_interval.as_millis()).unwrap_or(u64::MAX),
                cursor = relay.cursor(),
                "pool change relay started"
            );
            let mut timer = interval(relay.config.poll_interval.max(Duration::from_millis(1)));
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

            while relay.state.running.load(Ordering::SeqCst) {
                timer.tick().await;
                if !relay.state.running.load(Ordering::SeqCst) {
                    break;
                }
                if let Err(e) = relay.poll_once().await {
                    relay.state.failed_polls.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(error = %e, cursor = relay.cursor(), "pool change poll failed");
                }
            }
            tracing::info!("pool change relay stopped");
        })
    }

    pub fn stop(&self) {
        self.state.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> RelayStats {
        RelayStats {
            cursor: self.cursor(),
            polls: self.state.polls.load(Ordering::Relaxed),
            forwarded: self.state.forwarded.load(Ordering::Relaxed),
            failed_polls: self.state.failed_polls.load(Ordering::Relaxed),
        }
    }
}
