//! Wiring shared by the CLI commands.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::adapters::sqlite::{
    initialize_from_config, SqliteAssignmentStore, SqliteAuditQueries, SqliteDirectoryStore, SqlitePoolChangeLog,
};
use crate::domain::models::Config;
use crate::domain::ports::capacity_policy_from_config;
use crate::services::{
    AssignmentEngine, AssignmentLifecycle, IntegrityAuditor, PoolChangeRelay, PoolChangeRelayConfig, PoolEventBus,
    PoolEventBusConfig, ReassignmentReactor, TimeoutProcessor,
};

/// Database pool plus the configuration every service is built from.
pub struct AppContext {
    pub config: Config,
    pub pool: SqlitePool,
}

impl AppContext {
    /// Open and migrate the configured database.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = initialize_from_config(&config.database)
            .await
            .with_context(|| {
                format!(
                    "Failed to open database at {}. Run 'annotask init' first.",
                    config.database.path
                )
            })?;
        Ok(Self {
            config: config.clone(),
            pool,
        })
    }

    pub fn directory(&self) -> SqliteDirectoryStore {
        SqliteDirectoryStore::new(self.pool.clone())
    }

    pub fn assignment_store(&self) -> Arc<SqliteAssignmentStore> {
        Arc::new(SqliteAssignmentStore::new(self.pool.clone()))
    }

    pub fn engine(&self) -> Result<Arc<AssignmentEngine<SqliteAssignmentStore>>> {
        let capacity = capacity_policy_from_config(&self.config.capacity)?;
        Ok(Arc::new(
            AssignmentEngine::new(self.assignment_store())
                .with_capacity_policy(Arc::from(capacity))
                .with_assignment_timeout(self.config.engine.assignment_timeout()),
        ))
    }

    pub fn reactor(&self) -> Result<ReassignmentReactor<SqliteAssignmentStore>> {
        Ok(ReassignmentReactor::new(self.engine()?))
    }

    pub fn event_bus(&self) -> PoolEventBus {
        PoolEventBus::new(PoolEventBusConfig {
            channel_capacity: self.config.reactor.channel_capacity,
        })
    }

    pub fn pool_change_log(&self) -> Arc<SqlitePoolChangeLog> {
        Arc::new(SqlitePoolChangeLog::new(self.pool.clone()))
    }

    /// Forwards pool changes recorded by any process onto `bus`.
    pub fn pool_change_relay(&self, bus: Arc<PoolEventBus>) -> PoolChangeRelay<SqlitePoolChangeLog> {
        PoolChangeRelay::new(
            self.pool_change_log(),
            bus,
            PoolChangeRelayConfig::from(&self.config.reactor),
        )
    }

    pub fn timeout_processor(
        &self,
        reactor: ReassignmentReactor<SqliteAssignmentStore>,
    ) -> TimeoutProcessor<SqliteAssignmentStore> {
        TimeoutProcessor::new(reactor).with_batch_size(self.config.sweep.batch_size)
    }

    pub fn lifecycle(&self) -> AssignmentLifecycle<SqliteAssignmentStore> {
        AssignmentLifecycle::new(self.assignment_store())
    }

    pub fn auditor(&self) -> IntegrityAuditor<SqliteAuditQueries> {
        IntegrityAuditor::new(Arc::new(SqliteAuditQueries::new(self.pool.clone())))
    }
}
