//! In-process bus for pool membership events.
//!
//! Collaborators that change a project's pool publish a
//! [`PoolMembershipChanged`] here; the reassignment reactor subscribes.
//! Events carry a monotonically increasing sequence number.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::domain::models::PoolChangeRecord;

pub use crate::domain::models::MembershipChange;

/// Monotonically increasing sequence number assigned by the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SequenceNumber(pub u64);

impl std::fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A project's pool changed. Only `project_id` drives the reaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolMembershipChanged {
    pub project_id: Uuid,
    pub worker_id: Option<Uuid>,
    pub change: MembershipChange,
}

impl PoolMembershipChanged {
    pub fn joined(project_id: Uuid, worker_id: Uuid) -> Self {
        Self {
            project_id,
            worker_id: Some(worker_id),
            change: MembershipChange::Joined,
        }
    }

    pub fn left(project_id: Uuid, worker_id: Uuid) -> Self {
        Self {
            project_id,
            worker_id: Some(worker_id),
            change: MembershipChange::Left,
        }
    }

    /// Pool-wide change without a single worker attached (imports, bulk edits).
    pub fn updated(project_id: Uuid) -> Self {
        Self {
            project_id,
            worker_id: None,
            change: MembershipChange::Updated,
        }
    }
}

impl From<&PoolChangeRecord> for PoolMembershipChanged {
    fn from(record: &PoolChangeRecord) -> Self {
        Self {
            project_id: record.project_id,
            worker_id: record.worker_id,
            change: record.change,
        }
    }
}

/// Envelope delivered to subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolEvent {
    pub sequence: SequenceNumber,
    pub timestamp: DateTime<Utc>,
    pub payload: PoolMembershipChanged,
}

/// Configuration for the PoolEventBus.
#[derive(Debug, Clone)]
pub struct PoolEventBusConfig {
    /// Channel capacity for the broadcast channel.
    pub channel_capacity: usize,
}

impl Default for PoolEventBusConfig {
    fn default() -> Self {
        Self { channel_capacity: 1024 }
    }
}

pub struct PoolEventBus {
    sender: broadcast::Sender<PoolEvent>,
    sequence: AtomicU64,
}

impl PoolEventBus {
    pub fn new(config: PoolEventBusConfig) -> Self {
        let (sender, _) = broadcast::channel(config.channel_capacity.max(1));
        Self {
            sender,
            sequence: AtomicU64::new(0),
        }
    }

    /// Publish an event. Returns the sequence number it was given.
    pub fn publish(&self, payload: PoolMembershipChanged) -> SequenceNumber {
        let sequence = SequenceNumber(self.sequence.fetch_add(1, Ordering::SeqCst));
        tracing::debug!(
            sequence = sequence.0,
            project_id = %payload.project_id,
            change = payload.change.as_str(),
            "pool membership changed"
        );

        // No subscribers is fine.
        let _ = self.sender.send(PoolEvent {
            sequence,
            timestamp: Utc::now(),
            payload,
        });
        sequence
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PoolEvent> {
        self.sender.subscribe()
    }

    /// Sequence number the next event will receive.
    pub fn current_sequence(&self) -> SequenceNumber {
        SequenceNumber(self.sequence.load(Ordering::SeqCst))
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for PoolEventBus {
    fn default() -> Self {
        Self::new(PoolEventBusConfig::default())
    }
}
