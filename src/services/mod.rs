pub mod assignment_engine;
pub mod assignment_lifecycle;
pub mod event_bus;
pub mod integrity_auditor;
pub mod pool_change_relay;
pub mod project_locks;
pub mod reassignment_reactor;
pub mod timeout_daemon;
pub mod timeout_processor;

pub use assignment_engine::{
    AssignmentEngine, ProjectScope, DEFAULT_ASSIGNMENT_TIMEOUT_HOURS, DEFAULT_LEASE_TTL_SECS, DEFAULT_LEASE_WAIT_SECS,
};
pub use assignment_lifecycle::AssignmentLifecycle;
pub use event_bus::{
    MembershipChange, PoolEvent, PoolEventBus, PoolEventBusConfig, PoolMembershipChanged,
    SequenceNumber,
};
pub use integrity_auditor::{write_report_json, IntegrityAuditor, DEFAULT_TOP_WORKERS};
pub use pool_change_relay::{PoolChangeRelay, PoolChangeRelayConfig, RelayStats, DEFAULT_RELAY_BATCH_SIZE};
pub use project_locks::ProjectLocks;
pub use reassignment_reactor::{ReactorStats, ReassignmentReactor, TopUpOutcome};
pub use timeout_daemon::{
    DaemonHandle, DaemonStatus, StopReason, TimeoutDaemon, TimeoutDaemonConfig,
    TimeoutDaemonEvent,
};
pub use timeout_processor::{SweepHandle, TimeoutProcessor, DEFAULT_SWEEP_BATCH_SIZE};
