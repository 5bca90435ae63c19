//! Durable feed of pool membership changes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{MembershipChange, PoolChangeRecord};

/// Lets a process that did not make a pool change learn about it.
///
/// Sequences are strictly increasing; readers keep the last one they saw.
#[async_trait]
pub trait PoolChangeLog: Send + Sync {
    /// Record a change and return its sequence.
    async fn append_pool_change(
        &self,
        project_id: Uuid,
        worker_id: Option<Uuid>,
        change: MembershipChange,
        at: DateTime<Utc>,
    ) -> DomainResult<u64>;

    /// Changes with a sequence greater than `after`, ascending, at most `limit`.
    async fn pool_changes_after(&self, after: u64, limit: usize) -> DomainResult<Vec<PoolChangeRecord>>;

    /// Highest recorded sequence, 0 when the log is empty.
    async fn latest_pool_change(&self) -> DomainResult<u64>;
}
