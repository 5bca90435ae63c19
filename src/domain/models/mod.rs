pub mod assignment;
pub mod audit;
pub mod config;
pub mod expertise;
pub mod overlap;
pub mod pool;
pub mod sweep;
pub mod task;
pub mod worker;

pub use assignment::{
    Assignment, AssignmentFilter, AssignmentStatus, InsertOutcome, OverdueAssignment,
    OverdueCandidate, UnreadableRow,
};
pub use audit::{
    AuditCounts, AuditIssue, AuditReport, DuplicatePair, ExpertiseSummary, IdleMember,
    OverlapBucket, PoolSize, Severity, TaskCoverageCount, WorkerWorkload,
};
pub use config::{
    CapacityConfig, Config, DatabaseConfig, EngineConfig, LoggingConfig, ReactorConfig,
    SweepConfig,
};
pub use expertise::{ExpertiseGrant, ExpertiseTag, GrantStatus};
pub use overlap::{
    overlap_for_pool_size, AssignmentResult, AssignmentStatusKind, OverlapResult, MAX_OVERLAP,
};
pub use pool::{MembershipChange, PoolChangeRecord, PoolMember, PoolMembership, Project};
pub use sweep::{BackfillOutcome, SweepFailure, SweepReport, SweepStage};
pub use task::{Task, TaskCoverage};
pub use worker::{ApprovalStatus, ExperienceTier, Worker};
