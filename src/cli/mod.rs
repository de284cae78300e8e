//! Command-line interface.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use console::style;
use std::path::PathBuf;
use std::sync::Arc;

use crate::adapters::substrates::BackendRegistry;
use crate::domain::errors::TrainingError;
use crate::domain::models::Config;
use crate::domain::ports::BackendClient;

/// Hivelink command line.
#[derive(Parser, Debug)]
#[command(name = "hivelink")]
#[command(about = "Hierarchical agent delegation with trained prompt optimizers", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Configuration file, replacing .hivelink/config.yaml and local.yaml
    #[arg(short, long, global = true, env = "HIVELINK_CONFIG_FILE")]
    pub config: Option<PathBuf>,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train an optimizer artifact for one communication path
    Train(commands::train::TrainArgs),
    /// Inspect stored optimizer artifacts
    Artifact(commands::artifact::ArtifactArgs),
    /// Delegate one task down the hierarchy
    Delegate(commands::delegate::DelegateArgs),
    /// Print the validated routing table
    Routes(commands::routes::RoutesArgs),
}

/// Resolve the backend named on the command line, or the configured default.
pub(crate) fn backend_for(config: &Config, name: Option<&str>) -> anyhow::Result<Arc<dyn BackendClient>> {
    let registry = BackendRegistry::new(config.backend.clone());
    let backend = match name {
        Some(name) => registry.create(name)?,
        None => registry.default_backend()?,
    };
    Ok(backend)
}

/// Process exit status for a failed command.
///
/// Training that ends with too few usable examples exits 2 so scripts can
/// tell it apart from I/O and configuration failures (1).
pub fn exit_code(err: &anyhow::Error) -> i32 {
    let insufficient = err
        .chain()
        .any(|cause| cause.downcast_ref::<TrainingError>().is_some_and(TrainingError::is_insufficient_data));
    if insufficient {
        2
    } else {
        1
    }
}

/// Report `err` and exit with [`exit_code`].
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    let code = exit_code(&err);
    if json_mode {
        let body = serde_json::json!({
            "success": false,
            "error": format!("{err:#}"),
            "exit_code": code,
        });
        println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("{} {err:#}", style("error:").red().bold());
    }
    std::process::exit(code)
}
