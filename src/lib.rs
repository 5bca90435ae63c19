//! Annotask - adaptive overlap assignment for annotation projects
//!
//! Assigns every task of a project to up to three distinct workers from the
//! project's pool, keeps coverage topped up as the pool changes, expires
//! overdue work and audits the resulting distribution.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): models, errors and the store ports
//! - **Adapters** (`adapters`): SQLite implementations of the ports
//! - **Service Layer** (`services`): engine, reactor, timeout sweep, auditor
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use annotask::adapters::sqlite::{initialize_database, SqliteAssignmentStore};
//! use annotask::services::AssignmentEngine;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let pool = initialize_database("sqlite:annotask.db", None).await?;
//!     let engine = AssignmentEngine::new(Arc::new(SqliteAssignmentStore::new(pool)));
//!     let result = engine.adaptive_assign_project_tasks(project_id).await?;
//!     println!("{}", result.message);
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{
    Assignment, AssignmentResult, AssignmentStatus, AssignmentStatusKind, AuditReport, Config,
    OverlapResult, SweepReport, MAX_OVERLAP,
};
pub use domain::ports::{AssignmentStore, AuditQueries, CapacityPolicy, DirectoryStore, PoolChangeLog};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    AssignmentEngine, AssignmentLifecycle, IntegrityAuditor, PoolChangeRelay, PoolEventBus, ReassignmentReactor,
    TimeoutDaemon, TimeoutProcessor,
};
