//! Artifact CLI commands.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

use crate::adapters::store::open_store;
use crate::cli::output::{output, table, truncate, CommandOutput};
use crate::domain::models::{CommunicationPath, Config, OptimizerArtifact};

/// Arguments for `hivelink artifact`.
#[derive(Args, Debug)]
pub struct ArtifactArgs {
    /// Artifact directory; overrides the configured store
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    #[command(subcommand)]
    pub command: ArtifactCommands,
}

/// Artifact subcommands.
#[derive(Subcommand, Debug)]
pub enum ArtifactCommands {
    /// Show one artifact (latest version by default)
    Show {
        /// Communication path as source:destination
        path: CommunicationPath,
        /// Specific version
        #[arg(short, long)]
        version: Option<u64>,
    },
    /// List paths with a stored artifact
    List,
    /// List every version stored for a path
    History {
        /// Communication path as source:destination
        path: CommunicationPath,
    },
}

/// One artifact version as listed.
#[derive(Debug, Serialize)]
pub struct ArtifactSummary {
    pub path: String,
    pub version: u64,
    pub training_score: f64,
    pub demonstrations: usize,
    pub created_at: String,
}

impl From<&OptimizerArtifact> for ArtifactSummary {
    fn from(artifact: &OptimizerArtifact) -> Self {
        Self {
            path: artifact.path.to_string(),
            version: artifact.version,
            training_score: artifact.training_score,
            demonstrations: artifact.demonstrations.len(),
            created_at: artifact.created_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        }
    }
}

/// Output of `artifact list` and `artifact history`.
#[derive(Debug, Serialize)]
pub struct ArtifactListOutput {
    pub artifacts: Vec<ArtifactSummary>,
    pub total: usize,
}

impl CommandOutput for ArtifactListOutput {
    fn to_human(&self) -> String {
        if self.artifacts.is_empty() {
            return "No artifacts found.".to_string();
        }

        let mut t = table(["Path", "Version", "Score", "Demos", "Created"]);
        for artifact in &self.artifacts {
            t.add_row(vec![
                artifact.path.clone(),
                format!("v{}", artifact.version),
                format!("{:.3}", artifact.training_score),
                artifact.demonstrations.to_string(),
                artifact.created_at.clone(),
            ]);
        }
        format!("{t}\n\n{} artifact(s)", self.total)
    }
}

/// Output of `artifact show`: the full artifact record.
#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct ArtifactDetailOutput {
    pub artifact: OptimizerArtifact,
}

impl CommandOutput for ArtifactDetailOutput {
    fn to_human(&self) -> String {
        let a = &self.artifact;
        let mut lines = vec![
            format!("Artifact: {} v{}", a.path, a.version),
            format!("Created: {}", a.created_at.format("%Y-%m-%d %H:%M:%S UTC")),
            format!("Training score: {:.3}", a.training_score),
            format!(
                "Examples: {} train / {} validation, {} round(s)",
                a.metadata.train_examples, a.metadata.validation_examples, a.metadata.max_rounds
            ),
        ];
        if let Some(metric) = &a.metadata.metric {
            lines.push(format!("Metric: {metric}"));
        }
        lines.push(format!("\nInstruction:\n  {}", a.instruction));

        if !a.demonstrations.is_empty() {
            lines.push(format!("\nDemonstrations ({}):", a.demonstrations.len()));
            for (i, demo) in a.demonstrations.iter().enumerate() {
                lines.push(format!("  {}. input:  {}", i + 1, truncate(&demo.input.to_string(), 70)));
                lines.push(format!("     output: {}", truncate(&demo.output.to_string(), 70)));
            }
        }
        lines.join("\n")
    }
}

/// Run an artifact subcommand.
pub async fn execute(args: ArtifactArgs, config: &Config, json_mode: bool) -> Result<()> {
    let store = open_store(&config.store, args.store.as_deref())
        .await
        .context("Failed to open artifact store")?;

    match args.command {
        ArtifactCommands::Show { path, version } => {
            let artifact = match version {
                Some(v) => store.load_version(&path, v).await,
                None => store.load_latest(&path).await,
            }
            .with_context(|| format!("Failed to load artifact for {path}"))?
            .ok_or_else(|| match version {
                Some(v) => anyhow::anyhow!("No version {v} stored for {path}."),
                None => anyhow::anyhow!("No artifact stored for {path}. Use 'hivelink train' to create one."),
            })?;
            output(&ArtifactDetailOutput { artifact }, json_mode);
        }
        ArtifactCommands::List => {
            let mut artifacts = Vec::new();
            for path in store.list_paths().await.context("Failed to list artifacts")? {
                if let Some(latest) = store.load_latest(&path).await? {
                    artifacts.push(ArtifactSummary::from(&latest));
                }
            }
            let total = artifacts.len();
            output(&ArtifactListOutput { artifacts, total }, json_mode);
        }
        ArtifactCommands::History { path } => {
            let artifacts: Vec<ArtifactSummary> = store
                .history(&path)
                .await
                .with_context(|| format!("Failed to read history for {path}"))?
                .iter()
                .map(ArtifactSummary::from)
                .collect();
            let total = artifacts.len();
            output(&ArtifactListOutput { artifacts, total }, json_mode);
        }
    }

    Ok(())
}
