//! Timeout sweep.
//!
//! Expires open assignments whose due time has passed, then asks the
//! reactor to backfill each affected project once. Row failures, including
//! rows that do not decode, are recorded in the [`SweepReport`] and never
//! abort the sweep.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{BackfillOutcome, SweepFailure, SweepReport, SweepStage};
use crate::domain::ports::AssignmentStore;
use crate::services::assignment_engine::AssignmentEngine;
use crate::services::reassignment_reactor::ReassignmentReactor;

pub const DEFAULT_SWEEP_BATCH_SIZE: usize = 100;

/// Cancels an in-flight sweep. Rows already expired stay expired.
#[derive(Clone, Default)]
pub struct SweepHandle {
    stop_flag: Arc<AtomicBool>,
}

impl SweepHandle {
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::Release);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop_flag.load(Ordering::Acquire)
    }
}

pub struct TimeoutProcessor<S: AssignmentStore + 'static> {
    store: Arc<S>,
    engine: Arc<AssignmentEngine<S>>,
    reactor: ReassignmentReactor<S>,
    batch_size: usize,
    handle: SweepHandle,
}

impl<S: AssignmentStore + 'static> TimeoutProcessor<S> {
    /// Shares the store and project scopes of the reactor's engine.
    pub fn new(reactor: ReassignmentReactor<S>) -> Self {
        let engine = reactor.engine().clone();
        Self {
            store: engine.store().clone(),
            engine,
            reactor,
            batch_size: DEFAULT_SWEEP_BATCH_SIZE,
            handle: SweepHandle::default(),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn handle(&self) -> SweepHandle {
        self.handle.clone()
    }

    /// Sweep everything overdue as of now.
    pub async fn run_sweep(&self, project_filter: Option<Uuid>) -> DomainResult<SweepReport> {
        self.run_sweep_at(Utc::now(), project_filter).await
    }

    /// Sweep with an explicit clock. Only the initial snapshot query can
    /// fail the sweep as a whole; callers that must not fail turn that
    /// error into [`SweepReport::snapshot_failed`].
    #[instrument(skip(self), fields(batch_size = self.batch_size))]
    pub async fn run_sweep_at(&self, now: DateTime<Utc>, project_filter: Option<Uuid>) -> DomainResult<SweepReport> {
        let mut report = SweepReport::new(now, project_filter);
        let candidates = self.store.overdue_assignments(now, project_filter).await?;
        report.candidates = candidates.len();
        tracing::info!(candidates = candidates.len(), "timeout sweep started");

        let mut affected: BTreeSet<Uuid> = BTreeSet::new();

        'batches: for (batch_no, batch) in candidates.chunks(self.batch_size).enumerate() {
            for candidate in batch {
                if self.handle.is_stop_requested() {
                    report.cancelled = true;
                    tracing::warn!(visited = report.visited(), "timeout sweep cancelled");
                    break 'batches;
                }

                let row = match candidate {
                    Ok(row) => row,
                    Err(unreadable) => {
                        tracing::warn!(
                            assignment_id = ?unreadable.assignment_id,
                            error = %unreadable.error,
                            "overdue row does not decode, skipping"
                        );
                        report.failures.push(SweepFailure {
                            stage: SweepStage::Expire,
                            assignment_id: unreadable.assignment_id,
                            project_id: unreadable.project_id,
                            error: unreadable.error.clone(),
                        });
                        continue;
                    }
                };

                let outcome = match self.engine.enter_project(row.project_id).await {
                    Ok(scope) => {
                        let expired = self.store.expire_assignment(row.id, now).await;
                        self.engine.leave_project(scope).await;
                        expired
                    }
                    Err(e) => Err(e),
                };

                match outcome {
                    Ok(true) => {
                        report.expired += 1;
                        affected.insert(row.project_id);
                        tracing::debug!(
                            assignment_id = %row.id,
                            project_id = %row.project_id,
                            worker_id = %row.worker_id,
                            due_at = %row.due_at,
                            "assignment expired"
                        );
                    }
                    Ok(false) => {
                        report.skipped += 1;
                    }
                    Err(e) => {
                        tracing::warn!(assignment_id = %row.id, error = %e, "failed to expire assignment");
                        report.failures.push(SweepFailure {
                            stage: SweepStage::Expire,
                            assignment_id: Some(row.id),
                            project_id: Some(row.project_id),
                            error: e.to_string(),
                        });
                    }
                }
            }
            tracing::debug!(batch = batch_no, rows = batch.len(), "sweep batch processed");
        }

        for project_id in affected {
            match self.reactor.top_up(project_id).await {
                Ok(result) => report.backfills.push(BackfillOutcome {
                    project_id,
                    status: result.as_ref().map(|r| r.status),
                    created_count: result.map_or(0, |r| r.created_count),
                }),
                Err(e) => report.failures.push(SweepFailure {
                    stage: SweepStage::Backfill,
                    assignment_id: None,
                    project_id: Some(project_id),
                    error: e.to_string(),
                }),
            }
        }

        report.finished_at = Utc::now();
        tracing::info!(
            candidates = report.candidates,
            expired = report.expired,
            skipped = report.skipped,
            failures = report.failures.len(),
            backfilled = report.backfilled(),
            cancelled = report.cancelled,
            "timeout sweep finished"
        );
        Ok(report)
    }
}
