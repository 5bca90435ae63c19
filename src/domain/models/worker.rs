//! Worker domain model.
//!
//! Workers are the annotators who receive task assignments. Only approved
//! workers are ever eligible; the other statuses are owned by the onboarding
//! collaborator and merely observed here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Approval status of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Suspended,
    Rejected,
}

impl Default for ApprovalStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Suspended => "suspended",
            Self::Rejected => "rejected",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "suspended" => Some(Self::Suspended),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    /// Whether a worker in this status may receive assignments.
    pub fn is_assignable(&self) -> bool {
        matches!(self, Self::Approved)
    }
}

impl std::fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Experience tier of a worker. Informational; capacity policies may use it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperienceTier {
    Novice,
    Intermediate,
    Expert,
}

impl Default for ExperienceTier {
    fn default() -> Self {
        Self::Novice
    }
}

impl ExperienceTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Novice => "novice",
            Self::Intermediate => "intermediate",
            Self::Expert => "expert",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "novice" => Some(Self::Novice),
            "intermediate" => Some(Self::Intermediate),
            "expert" => Some(Self::Expert),
            _ => None,
        }
    }
}

/// An annotator known to the system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Worker {
    pub id: Uuid,
    pub email: String,
    pub status: ApprovalStatus,
    pub tier: ExperienceTier,
    pub created_at: DateTime<Utc>,
}

impl Worker {
    pub fn new(email: impl Into<String>, status: ApprovalStatus) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
            status,
            tier: ExperienceTier::default(),
            created_at: Utc::now(),
        }
    }

    pub fn with_tier(mut self, tier: ExperienceTier) -> Self {
        self.tier = tier;
        self
    }

    pub fn is_assignable(&self) -> bool {
        self.status.is_assignable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_approved_is_assignable() {
        assert!(ApprovalStatus::Approved.is_assignable());
        assert!(!ApprovalStatus::Pending.is_assignable());
        assert!(!ApprovalStatus::Suspended.is_assignable());
        assert!(!ApprovalStatus::Rejected.is_assignable());
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            ApprovalStatus::Pending,
            ApprovalStatus::Approved,
            ApprovalStatus::Suspended,
            ApprovalStatus::Rejected,
        ] {
            assert_eq!(ApprovalStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(ApprovalStatus::from_str("APPROVED"), Some(ApprovalStatus::Approved));
        assert_eq!(ApprovalStatus::from_str("banned"), None);
    }

    #[test]
    fn test_tier_ordering() {
        assert!(ExperienceTier::Novice < ExperienceTier::Expert);
        assert_eq!(ExperienceTier::from_str("expert"), Some(ExperienceTier::Expert));
    }
}
