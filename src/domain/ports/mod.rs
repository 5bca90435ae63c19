//! Port trait definitions (Hexagonal Architecture)
//!
//! - AssignmentStore: engine, reactor and sweep access to assignment data
//! - DirectoryStore: collaborator-owned data (projects, workers, pools, tasks, expertise)
//! - AuditQueries: read-only diagnostics
//! - CapacityPolicy: injectable workload cap
//! - PoolChangeLog: durable pool change feed for other processes

pub mod assignment_store;
pub mod audit_queries;
pub mod capacity_policy;
pub mod directory_store;
pub mod pool_change_log;

pub use assignment_store::AssignmentStore;
pub use audit_queries::AuditQueries;
pub use capacity_policy::{
    capacity_policy_from_config, CapacityPolicy, FixedCapacity, UnboundedCapacity,
};
pub use directory_store::DirectoryStore;
pub use pool_change_log::PoolChangeLog;
