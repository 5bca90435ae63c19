use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::Path;
use thiserror::Error;

use crate::domain::models::config::Config;
use crate::domain::ports::capacity_policy_from_config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Invalid assignment_timeout_hours: {0}. Must be at least 1")]
    InvalidAssignmentTimeout(u32),

    #[error("Invalid sweep batch_size: {0}. Must be at least 1")]
    InvalidBatchSize(usize),

    #[error("Invalid sweep interval_secs: {0}. Must be at least 1")]
    InvalidSweepInterval(u64),

    #[error("Invalid reactor channel_capacity: {0}. Must be at least 1")]
    InvalidChannelCapacity(usize),

    #[error("Invalid reactor poll_interval_ms: {0}. Must be at least 1")]
    InvalidPollInterval(u64),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Directory holding project-local configuration and the default database.
pub const CONFIG_DIR: &str = ".annotask";

/// Prefix for environment overrides, e.g. `ANNOTASK_SWEEP__BATCH_SIZE`.
pub const ENV_PREFIX: &str = "ANNOTASK_";

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .annotask/config.yaml (project config, created by init)
    /// 3. .annotask/local.yaml (local overrides, optional)
    /// 4. Environment variables (ANNOTASK_* prefix, `__` separates sections)
    pub fn load() -> Result<Config> {
        let config: Config = Self::figment(Path::new(CONFIG_DIR))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load with an explicit config file in place of the project files.
    /// Environment overrides still apply.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    fn figment(dir: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(dir.join("config.yaml")))
            .merge(Yaml::file(dir.join("local.yaml")))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(config.database.max_connections));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }
        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }
        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidRotation(config.logging.rotation.clone()));
        }

        if config.engine.assignment_timeout_hours == 0 {
            return Err(ConfigError::InvalidAssignmentTimeout(
                config.engine.assignment_timeout_hours,
            ));
        }

        capacity_policy_from_config(&config.capacity)
            .map_err(|e| ConfigError::ValidationFailed(e.to_string()))?;
        if config.capacity.policy.eq_ignore_ascii_case("fixed") && config.capacity.max_active_assignments == 0 {
            return Err(ConfigError::ValidationFailed(
                "fixed capacity policy needs max_active_assignments of at least 1".to_string(),
            ));
        }

        if config.sweep.batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize(config.sweep.batch_size));
        }
        if config.sweep.interval_secs == 0 {
            return Err(ConfigError::InvalidSweepInterval(config.sweep.interval_secs));
        }
        if config.reactor.channel_capacity == 0 {
            return Err(ConfigError::InvalidChannelCapacity(config.reactor.channel_capacity));
        }
        if config.reactor.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidPollInterval(config.reactor.poll_interval_ms));
        }

        Ok(())
    }
}
