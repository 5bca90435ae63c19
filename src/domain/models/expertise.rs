//! Expertise taxonomy and grants.
//!
//! Supplied by the onboarding/verification collaborator and consumed
//! read-only as an eligibility filter for tagged tasks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A taxonomy entry, identified by its slug.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpertiseTag {
    pub slug: String,
    pub name: String,
    pub active: bool,
}

impl ExpertiseTag {
    pub fn new(slug: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            name: name.into(),
            active: true,
        }
    }
}

/// Verification status of a grant. Only verified grants qualify a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantStatus {
    Pending,
    Verified,
}

impl GrantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Verified => "verified",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "verified" => Some(Self::Verified),
            _ => None,
        }
    }
}

/// A (worker, tag, status) fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpertiseGrant {
    pub worker_id: Uuid,
    pub tag: String,
    pub status: GrantStatus,
    pub granted_at: DateTime<Utc>,
}

impl ExpertiseGrant {
    pub fn verified(worker_id: Uuid, tag: impl Into<String>) -> Self {
        Self {
            worker_id,
            tag: tag.into(),
            status: GrantStatus::Verified,
            granted_at: Utc::now(),
        }
    }

    pub fn pending(worker_id: Uuid, tag: impl Into<String>) -> Self {
        Self {
            status: GrantStatus::Pending,
            ..Self::verified(worker_id, tag)
        }
    }
}
