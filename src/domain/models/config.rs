use serde::{Deserialize, Serialize};

/// Main configuration structure for annotask
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Assignment engine configuration
    #[serde(default)]
    pub engine: EngineConfig,

    /// Worker capacity policy
    #[serde(default)]
    pub capacity: CapacityConfig,

    /// Timeout sweep configuration
    #[serde(default)]
    pub sweep: SweepConfig,

    /// Reassignment reactor configuration
    #[serde(default)]
    pub reactor: ReactorConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".annotask/annotask.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

impl DatabaseConfig {
    pub fn url(&self) -> String {
        format!("sqlite:{}", self.path)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stdout only when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<String>,

    /// Rotation for file output: daily, hourly or never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}

/// Assignment engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EngineConfig {
    /// Hours a worker has to finish an assignment before the sweep expires it
    #[serde(default = "default_assignment_timeout_hours")]
    pub assignment_timeout_hours: u32,
}

const fn default_assignment_timeout_hours() -> u32 {
    24
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            assignment_timeout_hours: default_assignment_timeout_hours(),
        }
    }
}

impl EngineConfig {
    pub fn assignment_timeout(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.assignment_timeout_hours))
    }
}

/// Capacity policy selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CapacityConfig {
    /// Policy name: unbounded or fixed
    #[serde(default = "default_capacity_policy")]
    pub policy: String,

    /// Cap on open (assigned + in_progress) assignments per worker, for `fixed`
    #[serde(default = "default_max_active_assignments")]
    pub max_active_assignments: u32,
}

fn default_capacity_policy() -> String {
    "unbounded".to_string()
}

const fn default_max_active_assignments() -> u32 {
    50
}

impl Default for CapacityConfig {
    fn default() -> Self {
        Self {
            policy: default_capacity_policy(),
            max_active_assignments: default_max_active_assignments(),
        }
    }
}

/// Timeout sweep configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SweepConfig {
    /// Rows processed per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Seconds between sweeps when running as a daemon
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

const fn default_batch_size() -> usize {
    100
}

const fn default_interval_secs() -> u64 {
    3600
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            interval_secs: default_interval_secs(),
        }
    }
}

/// Reassignment reactor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ReactorConfig {
    /// Buffer size of the pool event channel
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// How often the daemon polls the pool change log (milliseconds)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

const fn default_channel_capacity() -> usize {
    1024
}

const fn default_poll_interval_ms() -> u64 {
    1000
}

impl Default for ReactorConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}
