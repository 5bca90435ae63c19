//! Pluggable workload cap.
//!
//! Whether a worker can take one more assignment is a deployment decision,
//! so the engine asks a policy instead of carrying a constant.

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{CapacityConfig, Worker};

pub trait CapacityPolicy: Send + Sync {
    /// Name used in logs and configuration.
    fn name(&self) -> &'static str;

    /// Whether `worker`, currently holding `open_load` open assignments,
    /// may receive another one.
    fn has_capacity(&self, worker: &Worker, open_load: u32) -> bool;
}

/// No cap at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnboundedCapacity;

impl CapacityPolicy for UnboundedCapacity {
    fn name(&self) -> &'static str {
        "unbounded"
    }

    fn has_capacity(&self, _worker: &Worker, _open_load: u32) -> bool {
        true
    }
}

/// The same cap for every worker.
#[derive(Debug, Clone, Copy)]
pub struct FixedCapacity {
    pub max_open: u32,
}

impl FixedCapacity {
    pub fn new(max_open: u32) -> Self {
        Self { max_open }
    }
}

impl CapacityPolicy for FixedCapacity {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn has_capacity(&self, _worker: &Worker, open_load: u32) -> bool {
        open_load < self.max_open
    }
}

/// Build the policy named in configuration.
pub fn capacity_policy_from_config(config: &CapacityConfig) -> DomainResult<Box<dyn CapacityPolicy>> {
    match config.policy.to_lowercase().as_str() {
        "unbounded" => Ok(Box::new(UnboundedCapacity)),
        "fixed" => Ok(Box::new(FixedCapacity::new(config.max_active_assignments))),
        other => Err(DomainError::ValidationFailed(format!(
            "unknown capacity policy: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ApprovalStatus;

    #[test]
    fn test_fixed_capacity_is_strict_upper_bound() {
        let worker = Worker::new("a@example.com", ApprovalStatus::Approved);
        let policy = FixedCapacity::new(2);
        assert!(policy.has_capacity(&worker, 0));
        assert!(policy.has_capacity(&worker, 1));
        assert!(!policy.has_capacity(&worker, 2));
    }

    #[test]
    fn test_policy_from_config() {
        let policy = capacity_policy_from_config(&CapacityConfig::default()).unwrap();
        assert_eq!(policy.name(), "unbounded");

        let config = CapacityConfig {
            policy: "Fixed".to_string(),
            max_active_assignments: 1,
        };
        let policy = capacity_policy_from_config(&config).unwrap();
        assert_eq!(policy.name(), "fixed");

        let config = CapacityConfig {
            policy: "tiered".to_string(),
            max_active_assignments: 1,
        };
        assert!(capacity_policy_from_config(&config).is_err());
    }
}
