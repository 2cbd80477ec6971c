//! Phylogen CLI entry point.

use clap::Parser;

use phylogen::cli::{Cli, Commands};
use phylogen::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match cli.load_config() {
        Ok(config) => config,
        Err(err) => phylogen::cli::handle_error(err, cli.json),
    };

    let mut log_config = LogConfig::from(&config.logging);
    if cli.json {
        // stdout carries the JSON result
        log_config.enable_stdout = false;
    }
    let _logger = match LoggerImpl::init(&log_config) {
        Ok(logger) => logger,
        Err(err) => phylogen::cli::handle_error(err, cli.json),
    };

    let result = match cli.command {
        Commands::Align(args) => phylogen::cli::commands::align::execute(args, config, cli.json).await,
        Commands::Phylogeny(args) => {
            phylogen::cli::commands::phylogeny::execute(args, config, cli.json).await
        }
        Commands::Consensus(args) => phylogen::cli::commands::consensus::execute(args, cli.json).await,
    };

    if let Err(err) = result {
        phylogen::cli::handle_error(err, cli.json);
    }
}
