//! Hivelink CLI entry point.

use clap::Parser;

use hivelink::cli::{commands, handle_error, Cli, Commands};
use hivelink::infrastructure::config::ConfigLoader;
use hivelink::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match ConfigLoader::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => handle_error(anyhow::Error::new(err).context("Failed to load configuration"), cli.json),
    };

    let logger = match LoggerImpl::init(&LogConfig::from(&config.logging)) {
        Ok(logger) => logger,
        Err(err) => handle_error(err, cli.json),
    };

    let result = match cli.command {
        Commands::Train(args) => commands::train::execute(args, &config, cli.json).await,
        Commands::Artifact(args) => commands::artifact::execute(args, &config, cli.json).await,
        Commands::Delegate(args) => commands::delegate::execute(args, &config, cli.json).await,
        Commands::Routes(args) => commands::routes::execute(args, &config, cli.json).await,
    };

    if let Err(err) = result {
        drop(logger);
        handle_error(err, cli.json);
    }
}
