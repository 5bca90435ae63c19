//! Implementation of the `annotask init` command.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use tokio::fs;

use crate::adapters::sqlite::initialize_from_config;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{Config, DatabaseConfig};
use crate::infrastructure::config::loader::CONFIG_DIR;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing config.yaml
    #[arg(long, short)]
    pub force: bool,

    /// Target directory (defaults to current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,
}

#[derive(Debug, serde::Serialize)]
pub struct InitOutput {
    pub success: bool,
    pub message: String,
    pub initialized_path: PathBuf,
    pub config_written: bool,
    pub database_path: PathBuf,
}

impl CommandOutput for InitOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![self.message.clone()];
        if self.config_written {
            lines.push(format!("Wrote {CONFIG_DIR}/config.yaml"));
        }
        lines.push(format!("Database ready at {}", self.database_path.display()));
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: InitArgs, config: &Config, json_mode: bool) -> Result<()> {
    let target_path = if args.path.is_absolute() {
        args.path.clone()
    } else {
        std::env::current_dir()
            .context("Failed to get current directory")?
            .join(&args.path)
    };

    let config_dir = target_path.join(CONFIG_DIR);
    fs::create_dir_all(config_dir.join("logs"))
        .await
        .with_context(|| format!("Failed to create {}", config_dir.display()))?;

    let config_file = config_dir.join("config.yaml");
    let config_written = args.force || !config_file.exists();
    if config_written {
        let yaml = serde_yaml::to_string(&Config::default()).context("Failed to render default config")?;
        fs::write(&config_file, yaml)
            .await
            .with_context(|| format!("Failed to write {}", config_file.display()))?;
    }

    // The database always lands under the target directory, whatever the
    // current configuration points at.
    let database_path = target_path.join(Config::default().database.path);
    let database = DatabaseConfig {
        path: database_path.display().to_string(),
        max_connections: config.database.max_connections,
    };
    let pool = initialize_from_config(&database)
        .await
        .context("Failed to initialize database")?;
    pool.close().await;

    let out = InitOutput {
        success: true,
        message: if config_written {
            "Project initialized.".to_string()
        } else {
            "Project already initialized; database migrated. Use --force to rewrite config.yaml.".to_string()
        },
        initialized_path: target_path,
        config_written,
        database_path,
    };
    output(&out, json_mode);
    Ok(())
}
