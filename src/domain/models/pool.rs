//! Projects and pool membership.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::worker::Worker;

/// A labeling project whose tasks are distributed to a worker pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

impl Project {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            created_at: Utc::now(),
        }
    }
}

/// Membership of a worker in a project's pool.
///
/// Unique per (project, worker). Leaving a pool flips `active` to false;
/// the row itself is kept as history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolMembership {
    pub project_id: Uuid,
    pub worker_id: Uuid,
    pub active: bool,
    pub joined_at: DateTime<Utc>,
}

impl PoolMembership {
    pub fn new(project_id: Uuid, worker_id: Uuid) -> Self {
        Self {
            project_id,
            worker_id,
            active: true,
            joined_at: Utc::now(),
        }
    }

    pub fn joined_at(mut self, joined_at: DateTime<Utc>) -> Self {
        self.joined_at = joined_at;
        self
    }
}

/// What happened to a project's pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipChange {
    Joined,
    Left,
    /// Approval status, grants or anything else affecting eligibility.
    Updated,
}

impl MembershipChange {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Joined => "joined",
            Self::Left => "left",
            Self::Updated => "updated",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "joined" => Some(Self::Joined),
            "left" => Some(Self::Left),
            "updated" => Some(Self::Updated),
            _ => None,
        }
    }
}

/// Persisted pool change, read back by processes that did not make it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolChangeRecord {
    pub sequence: u64,
    pub project_id: Uuid,
    pub worker_id: Option<Uuid>,
    pub change: MembershipChange,
    pub recorded_at: DateTime<Utc>,
}

/// An active pool member joined with its worker record.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolMember {
    pub worker: Worker,
    pub joined_at: DateTime<Utc>,
}
