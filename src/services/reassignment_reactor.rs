//! Reassignment reactor.
//!
//! Subscribes to [`PoolEventBus`] and re-runs the engine's top-up for the
//! project named by each event. Top-ups are strictly additive: a smaller
//! pool lowers the target for future rows but never revokes existing ones.
//!
//! The reactor can be suspended around bulk data loads. Projects that change
//! while suspended are coalesced and each gets exactly one pass on resume.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{AssignmentResult, AssignmentStatusKind};
use crate::domain::ports::AssignmentStore;
use crate::services::assignment_engine::AssignmentEngine;
use crate::services::event_bus::{PoolEvent, PoolEventBus};

/// Result of one top-up attempt, errors flattened to text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopUpOutcome {
    pub project_id: Uuid,
    pub status: Option<AssignmentStatusKind>,
    pub created_count: u32,
    pub error: Option<String>,
}

impl TopUpOutcome {
    fn from_result(project_id: Uuid, result: &DomainResult<AssignmentResult>) -> Self {
        match result {
            Ok(r) => Self {
                project_id,
                status: Some(r.status),
                created_count: r.created_count,
                error: None,
            },
            Err(e) => Self {
                project_id,
                status: None,
                created_count: 0,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Counters exposed for monitoring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReactorStats {
    pub events_received: u64,
    pub passes_run: u64,
    pub passes_failed: u64,
    pub deferred: u64,
    pub resyncs: u64,
}

#[derive(Default)]
struct ReactorState {
    suspended: AtomicBool,
    running: AtomicBool,
    pending: Mutex<BTreeSet<Uuid>>,
    events_received: AtomicU64,
    passes_run: AtomicU64,
    passes_failed: AtomicU64,
    deferred: AtomicU64,
    resyncs: AtomicU64,
}

pub struct ReassignmentReactor<S: AssignmentStore + 'static> {
    engine: Arc<AssignmentEngine<S>>,
    state: Arc<ReactorState>,
}

impl<S: AssignmentStore + 'static> Clone for ReassignmentReactor<S> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            state: self.state.clone(),
        }
    }
}

impl<S: AssignmentStore + 'static> ReassignmentReactor<S> {
    pub fn new(engine: Arc<AssignmentEngine<S>>) -> Self {
        Self {
            engine,
            state: Arc::new(ReactorState::default()),
        }
    }

    pub fn engine(&self) -> &Arc<AssignmentEngine<S>> {
        &self.engine
    }

    /// Run one top-up pass for `project_id`.
    ///
    /// While suspended the project is queued instead and `Ok(None)` is
    /// returned.
    pub async fn top_up(&self, project_id: Uuid) -> DomainResult<Option<AssignmentResult>> {
        if self.state.suspended.load(Ordering::SeqCst) {
            let mut pending = self.state.pending.lock().await;
            // Re-check under the lock so a concurrent resume cannot strand the id.
            if self.state.suspended.load(Ordering::SeqCst) {
                pending.insert(project_id);
                self.state.deferred.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(project_id = %project_id, "reactor suspended, top-up deferred");
                return Ok(None);
            }
        }

        self.run_pass(project_id).await.map(Some)
    }

    /// React to one pool event.
    pub async fn handle_event(&self, event: &PoolEvent) -> DomainResult<Option<AssignmentResult>> {
        self.state.events_received.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            sequence = event.sequence.0,
            project_id = %event.payload.project_id,
            change = event.payload.change.as_str(),
            "pool membership changed"
        );
        self.top_up(event.payload.project_id).await
    }

    async fn run_pass(&self, project_id: Uuid) -> DomainResult<AssignmentResult> {
        let result = self.engine.adaptive_assign_project_tasks(project_id).await;
        match &result {
            Ok(r) => {
                self.state.passes_run.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    project_id = %project_id,
                    status = r.status.as_str(),
                    created = r.created_count,
                    "top-up finished"
                );
            }
            Err(e) => {
                self.state.passes_failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(project_id = %project_id, error = %e, "top-up failed");
            }
        }
        result
    }

    /// Stop reacting; queue projects until [`resume`](Self::resume).
    pub fn suspend(&self) {
        self.state.suspended.store(true, Ordering::SeqCst);
        tracing::info!("reassignment reactor suspended");
    }

    /// Resume and run one pass per project queued while suspended.
    pub async fn resume(&self) -> Vec<TopUpOutcome> {
        let pending = {
            let mut pending = self.state.pending.lock().await;
            self.state.suspended.store(false, Ordering::SeqCst);
            std::mem::take(&mut *pending)
        };

        tracing::info!(pending = pending.len(), "reassignment reactor resumed");

        let mut outcomes = Vec::with_capacity(pending.len());
        for project_id in pending {
            let result = self.run_pass(project_id).await;
            outcomes.push(TopUpOutcome::from_result(project_id, &result));
        }
        outcomes
    }

    pub fn is_suspended(&self) -> bool {
        self.state.suspended.load(Ordering::SeqCst)
    }

    pub async fn pending_projects(&self) -> Vec<Uuid> {
        self.state.pending.lock().await.iter().copied().collect()
    }

    /// One top-up for every project with an active pool. Used after the
    /// subscription lagged and events were lost.
    pub async fn resync(&self) -> DomainResult<Vec<TopUpOutcome>> {
        self.state.resyncs.fetch_add(1, Ordering::Relaxed);
        let projects = self.engine.store().projects_with_active_pool().await?;
        tracing::info!(projects = projects.len(), "reactor resync");

        let mut outcomes = Vec::with_capacity(projects.len());
        for project_id in projects {
            let result = self.top_up(project_id).await;
            outcomes.push(match result {
                Ok(Some(r)) => TopUpOutcome::from_result(project_id, &Ok(r)),
                Ok(None) => TopUpOutcome {
                    project_id,
                    status: None,
                    created_count: 0,
                    error: None,
                },
                Err(e) => TopUpOutcome::from_result(project_id, &Err(e)),
            });
        }
        Ok(outcomes)
    }

    /// Spawn the subscription loop. Returns a JoinHandle that can be aborted on shutdown.
    pub fn start(&self, bus: &PoolEventBus) -> tokio::task::JoinHandle<()> {
        self.state.running.store(true, Ordering::SeqCst);
        let mut receiver = bus.subscribe();
        let reactor = self.clone();

        tokio::spawn(async move {
            tracing::info!("reassignment reactor started");
            while reactor.state.running.load(Ordering::SeqCst) {
                let event = match tokio::time::timeout(Duration::from_secs(1), receiver.recv()).await {
                    Ok(Ok(event)) => event,
                    Ok(Err(RecvError::Lagged(missed))) => {
                        tracing::warn!(missed, "reactor lagged behind pool events, resyncing");
                        if let Err(e) = reactor.resync().await {
                            tracing::error!(error = %e, "reactor resync failed");
                        }
                        continue;
                    }
                    Ok(Err(RecvError::Closed)) => {
                        tracing::info!("pool event bus closed, stopping reactor");
                        break;
                    }
                    // Timeout: loop to check the running flag.
                    Err(_) => continue,
                };

                // Failures are counted and logged in run_pass.
                let _ = reactor.handle_event(&event).await;
            }
            reactor.state.running.store(false, Ordering::SeqCst);
            tracing::info!("reassignment reactor stopped");
        })
    }

    /// Ask the subscription loop to exit.
    pub fn stop(&self) {
        self.state.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> ReactorStats {
        ReactorStats {
            events_received: self.state.events_received.load(Ordering::Relaxed),
            passes_run: self.state.passes_run.load(Ordering::Relaxed),
            passes_failed: self.state.passes_failed.load(Ordering::Relaxed),
            deferred: self.state.deferred.load(Ordering::Relaxed),
            resyncs: self.state.resyncs.load(Ordering::Relaxed),
        }
    }
}
