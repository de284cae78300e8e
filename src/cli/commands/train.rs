//! `hivelink train`: build the next optimizer artifact for a path.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

use crate::adapters::store::open_store;
use crate::cli::backend_for;
use crate::cli::output::{output, spinner, CommandOutput};
use crate::domain::models::{CommunicationPath, Config, OptimizerArtifact};
use crate::services::metric;
use crate::services::{load_dataset, ResponseParser, Trainer, TrainerOptions};

/// Arguments for `hivelink train`.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Communication path as source:destination, e.g. queen:princess-dev
    #[arg(long)]
    pub path: CommunicationPath,

    /// Examples file (.json, .jsonl, .yaml)
    #[arg(long)]
    pub dataset: PathBuf,

    /// Demonstrations kept in the artifact
    #[arg(long, default_value_t = 4)]
    pub max_demos: usize,

    /// Bootstrap rounds over the training split
    #[arg(long, default_value_t = 1)]
    pub max_rounds: u32,

    /// Artifact directory; overrides the configured store
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Scoring metric (exact_match, field_overlap)
    #[arg(long, default_value = "exact_match")]
    pub metric: String,

    /// Backend to train against (claude_code, anthropic_api, mock)
    #[arg(long)]
    pub backend: Option<String>,
}

/// Summary of a saved artifact.
#[derive(Debug, Serialize)]
pub struct TrainOutput {
    pub success: bool,
    pub path: String,
    pub version: u64,
    pub training_score: f64,
    pub demonstrations: usize,
    pub train_examples: usize,
    pub validation_examples: usize,
    pub skipped_calls: usize,
}

impl From<&OptimizerArtifact> for TrainOutput {
    fn from(artifact: &OptimizerArtifact) -> Self {
        Self {
            success: true,
            path: artifact.path.to_string(),
            version: artifact.version,
            training_score: artifact.training_score,
            demonstrations: artifact.demonstrations.len(),
            train_examples: artifact.metadata.train_examples,
            validation_examples: artifact.metadata.validation_examples,
            skipped_calls: artifact.metadata.skipped_calls,
        }
    }
}

impl CommandOutput for TrainOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![
            format!("Trained {} v{}", self.path, self.version),
            format!("  Validation score: {:.3}", self.training_score),
            format!("  Demonstrations: {}", self.demonstrations),
            format!(
                "  Examples: {} train / {} validation",
                self.train_examples, self.validation_examples
            ),
        ];
        if self.skipped_calls > 0 {
            lines.push(format!("  Skipped backend calls: {}", self.skipped_calls));
        }
        lines.join("\n")
    }
}

/// Train one path and persist the resulting artifact.
pub async fn execute(args: TrainArgs, config: &Config, json_mode: bool) -> Result<()> {
    let metric = metric::builtin(&args.metric)
        .ok_or_else(|| anyhow::anyhow!("Unknown metric '{}'. Use exact_match or field_overlap.", args.metric))?;

    let examples = load_dataset(&args.dataset)
        .await
        .with_context(|| format!("Failed to load dataset {}", args.dataset.display()))?;

    let store = open_store(&config.store, args.output.as_deref())
        .await
        .context("Failed to open artifact store")?;
    let backend = backend_for(config, args.backend.as_deref())?;

    let trainer = Trainer::new(backend, store, TrainerOptions::from(&config.trainer))
        .with_parser(ResponseParser::new(config.transport.max_response_bytes));

    let progress = spinner(format!("Training {} on {} examples", args.path, examples.len()), json_mode);
    let result = trainer
        .train(args.path, &examples, metric.as_ref(), args.max_demos, args.max_rounds)
        .await;
    progress.finish_and_clear();

    let artifact = result.with_context(|| format!("Training {} failed", args.path))?;
    output(&TrainOutput::from(&artifact), json_mode);
    Ok(())
}
