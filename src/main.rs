//! Annotask CLI entry point.

use clap::Parser;

use annotask::cli::{commands, handle_error, Cli, Commands};
use annotask::infrastructure::config::ConfigLoader;
use annotask::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match ConfigLoader::load() {
        Ok(config) => config,
        Err(err) => handle_error(err, cli.json),
    };

    let _logger = match LoggerImpl::init(&LogConfig::from(&config.logging)) {
        Ok(logger) => logger,
        Err(err) => handle_error(err, cli.json),
    };

    let json = cli.json;
    let result = match cli.command {
        Commands::Init(args) => commands::init::execute(args, &config, json).await,
        Commands::Overlap(args) => commands::overlap::execute(args, &config, json).await,
        Commands::Assign(args) => commands::assign::execute(args, &config, json).await,
        Commands::Sweep(args) => commands::sweep::execute(args, &config, json).await,
        Commands::Audit(args) => commands::audit::execute(args, &config, json).await,
        Commands::Pool(args) => commands::pool::execute(args, &config, json).await,
        Commands::Assignment(args) => commands::assignment::execute(args, &config, json).await,
        Commands::Import(args) => commands::import::execute(args, &config, json).await,
        Commands::Daemon(args) => commands::daemon::execute(args, &config, json).await,
    };

    if let Err(err) = result {
        handle_error(err, json);
    }
}
