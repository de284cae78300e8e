//! Offline optimizer training.
//!
//! Bootstraps few-shot demonstrations for one path: run the baseline prompt
//! over the training split, score each parsed output against the expected
//! output, keep the best candidates as demonstrations, then measure the
//! resulting artifact on the validation split and persist it as the next
//! version.

use futures::future::join_all;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

use super::call_limiter::CallLimiter;
use super::metric::Metric;
use super::prompt::{baseline_instruction, CompiledArtifact, PromptBuilder};
use super::response_parser::{ParsedResponse, ResponseParser};
use crate::domain::errors::TrainingError;
use crate::domain::models::{
    CanonicalExample, CommunicationPath, Demonstration, Example, OptimizerArtifact, Prompt, TrainerConfig,
    TrainingMetadata,
};
use crate::domain::ports::{ArtifactStore, BackendClient, FinishReason};

/// Task type used for examples whose input does not name one.
pub const DEFAULT_TASK_TYPE: &str = "training";

/// Tuning for a [`Trainer`] run.
#[derive(Debug, Clone)]
pub struct TrainerOptions {
    /// Share of examples held out for validation, in (0, 1).
    pub validation_ratio: f64,
    pub min_examples: usize,
    /// An example stops being retried once it scores at least this.
    pub acceptance_threshold: f64,
    pub max_concurrency: usize,
    pub requests_per_minute: Option<u32>,
    pub call_timeout: Duration,
    pub task_type: String,
}

impl Default for TrainerOptions {
    fn default() -> Self {
        Self::from(&TrainerConfig::default())
    }
}

impl From<&TrainerConfig> for TrainerOptions {
    fn from(config: &TrainerConfig) -> Self {
        Self {
            validation_ratio: config.validation_ratio,
            min_examples: config.min_examples,
            acceptance_threshold: config.acceptance_threshold,
            max_concurrency: config.max_concurrency,
            requests_per_minute: config.requests_per_minute,
            call_timeout: Duration::from_millis(config.call_timeout_ms),
            task_type: DEFAULT_TASK_TYPE.to_string(),
        }
    }
}

/// Outcome of scoring an artifact on the validation split.
#[derive(Debug, Clone, Copy)]
struct Validation {
    score: f64,
    completed: usize,
}

/// Best scored output seen for one training example.
#[derive(Debug, Clone)]
struct Candidate {
    round: u32,
    score: f64,
    reasoning: String,
    output: serde_json::Value,
}

/// Offline trainer for one backend and one artifact store.
///
/// Backend calls are admitted through a [`CallLimiter`] before their
/// deadline starts, so `max_concurrency` and `requests_per_minute` shape
/// throughput without turning queueing into timeouts.
pub struct Trainer {
    backend: Arc<dyn BackendClient>,
    limiter: CallLimiter,
    store: Arc<dyn ArtifactStore>,
    parser: ResponseParser,
    options: TrainerOptions,
}

impl Trainer {
    /// Trainer calling `backend` and saving to `store`.
    pub fn new(backend: Arc<dyn BackendClient>, store: Arc<dyn ArtifactStore>, options: TrainerOptions) -> Self {
        let limiter =
            CallLimiter::new(options.max_concurrency).with_requests_per_minute(options.requests_per_minute);
        Self {
            backend,
            limiter,
            store,
            parser: ResponseParser::default(),
            options,
        }
    }

    /// Replace the default response parser.
    pub fn with_parser(mut self, parser: ResponseParser) -> Self {
        self.parser = parser;
        self
    }

    /// Options for this run.
    pub fn options(&self) -> &TrainerOptions {
        &self.options
    }

    /// Train and persist the next artifact version for `path`.
    ///
    /// Nothing is written unless training succeeds, so the previously active
    /// version stays in place on any error.
    #[instrument(skip(self, examples, metric), fields(metric = metric.name(), examples = examples.len()))]
    pub async fn train(
        &self,
        path: CommunicationPath,
        examples: &[Example],
        metric: &dyn Metric,
        max_demos: usize,
        max_rounds: u32,
    ) -> Result<OptimizerArtifact, TrainingError> {
        self.check_arguments(&path, max_demos, max_rounds)?;

        let prepared = prepare(examples);
        let required = self.options.min_examples.max(2);
        if prepared.len() < required {
            return Err(TrainingError::InsufficientTrainingData {
                path,
                survived: prepared.len(),
                required,
            });
        }

        let validation_count = validation_size(prepared.len(), self.options.validation_ratio);
        let (train, validation) = prepared.split_at(prepared.len() - validation_count);
        info!(
            %path,
            unique = prepared.len(),
            train = train.len(),
            validation = validation.len(),
            "starting training"
        );

        let mut skipped_calls = 0;
        let mut best: Vec<Option<Candidate>> = vec![None; train.len()];

        for round in 1..=max_rounds {
            let pending: Vec<usize> = (0..train.len())
                .filter(|&i| best[i].as_ref().map_or(true, |c| c.score < self.options.acceptance_threshold))
                .collect();
            if pending.is_empty() {
                break;
            }

            let attempts = pending.iter().map(|&i| {
                let task = train[i].to_task(&self.options.task_type, timeout_ms(self.options.call_timeout));
                let prompt = PromptBuilder::baseline(&path, &task);
                async move { self.attempt(&prompt).await }
            });
            let outcomes = join_all(attempts).await;

            let mut accepted = 0;
            for (&i, outcome) in pending.iter().zip(outcomes) {
                let example = &train[i];
                match outcome {
                    Ok(parsed) => {
                        let score = metric.evaluate(&example.expected.to_json(), &parsed.output);
                        if score >= self.options.acceptance_threshold {
                            accepted += 1;
                        }
                        if best[i].as_ref().map_or(true, |c| score > c.score) {
                            best[i] = Some(Candidate {
                                round,
                                score,
                                reasoning: parsed.reasoning,
                                output: parsed.output,
                            });
                        }
                    }
                    Err(reason) => {
                        skipped_calls += 1;
                        warn!(%path, example = %example.id, round, %reason, "training call failed, skipping");
                    }
                }
            }
            info!(%path, round, attempted = pending.len(), accepted, "training round finished");
        }

        // Upper bound: assumes every validation call will complete.
        let scored = best.iter().filter(|c| c.is_some()).count();
        if scored + validation.len() < required {
            return Err(TrainingError::InsufficientTrainingData {
                path,
                survived: scored + validation.len(),
                required,
            });
        }

        let demonstrations = select_demonstrations(train, &best, max_demos);
        if demonstrations.is_empty() {
            return Err(TrainingError::NoDemonstrations { path, scored });
        }
        let version = self.store.latest_version(&path).await? + 1;

        let mut artifact = OptimizerArtifact {
            path,
            instruction: baseline_instruction(&path),
            demonstrations,
            training_score: 0.0,
            version,
            created_at: chrono::Utc::now(),
            metadata: TrainingMetadata {
                train_examples: train.len(),
                validation_examples: validation.len(),
                skipped_calls,
                max_rounds,
                max_demos,
                metric: Some(metric.name().to_string()),
            },
        };

        let validated = self.evaluate(&artifact, validation, metric).await?;
        if validated.completed == 0 {
            return Err(TrainingError::ValidationUnavailable {
                path,
                attempted: validation.len(),
            });
        }
        let survived = scored + validated.completed;
        if survived < required {
            return Err(TrainingError::InsufficientTrainingData { path, survived, required });
        }

        artifact.training_score = validated.score;
        self.store.save(&artifact).await?;

        info!(
            %path,
            version,
            demonstrations = artifact.demonstrations.len(),
            training_score = artifact.training_score,
            skipped_calls,
            "artifact saved"
        );
        Ok(artifact)
    }

    fn check_arguments(&self, path: &CommunicationPath, max_demos: usize, max_rounds: u32) -> Result<(), TrainingError> {
        if !path.is_downward() {
            return Err(TrainingError::InvalidArguments(format!(
                "{path} does not delegate down the hierarchy"
            )));
        }
        if max_demos == 0 {
            return Err(TrainingError::InvalidArguments("max_demos must be at least 1".to_string()));
        }
        if max_rounds == 0 {
            return Err(TrainingError::InvalidArguments("max_rounds must be at least 1".to_string()));
        }
        let ratio = self.options.validation_ratio;
        if !(ratio > 0.0 && ratio < 1.0) {
            return Err(TrainingError::InvalidArguments(format!(
                "validation_ratio {ratio} must be between 0 and 1"
            )));
        }
        Ok(())
    }

    /// Mean metric of the compiled artifact over `validation`. A failed call
    /// scores 0 and is not counted as completed.
    async fn evaluate(
        &self,
        artifact: &OptimizerArtifact,
        validation: &[CanonicalExample],
        metric: &dyn Metric,
    ) -> Result<Validation, TrainingError> {
        let compiled = CompiledArtifact::compile(artifact.clone())?;

        let calls = validation.iter().map(|example| {
            let task = example.to_task(&self.options.task_type, timeout_ms(self.options.call_timeout));
            let prompt = compiled.augment(&task);
            async move { self.attempt(&prompt).await }
        });
        let outcomes = join_all(calls).await;

        let mut total = 0.0;
        let mut completed = 0;
        for (example, outcome) in validation.iter().zip(outcomes) {
            match outcome {
                Ok(parsed) => {
                    completed += 1;
                    total += metric.evaluate(&example.expected.to_json(), &parsed.output);
                }
                Err(reason) => {
                    warn!(path = %artifact.path, example = %example.id, %reason, "validation call failed, scoring 0");
                }
            }
        }

        Ok(Validation {
            score: total / validation.len() as f64,
            completed,
        })
    }

    /// One backend call, parsed. Errors are reported as text and skipped.
    ///
    /// The deadline starts once the limiter admits the call.
    async fn attempt(&self, prompt: &Prompt) -> Result<ParsedResponse, String> {
        let _permit = self
            .limiter
            .admit()
            .await
            .ok_or_else(|| "call limiter closed".to_string())?;

        let deadline = self.options.call_timeout;
        let completion = match tokio::time::timeout(deadline, self.backend.complete(prompt, deadline)).await {
            Err(_) => return Err(format!("timed out after {}ms", timeout_ms(deadline))),
            Ok(Err(e)) => return Err(e.to_string()),
            Ok(Ok(completion)) => completion,
        };
        if completion.finish_reason == FinishReason::Error {
            return Err("backend reported an error".to_string());
        }

        let parsed = self.parser.parse(&completion.text).map_err(|e| e.to_string())?;
        if !parsed.success {
            return Err(parsed.error.unwrap_or_else(|| "backend reported failure".to_string()));
        }
        Ok(parsed)
    }
}

/// Normalize, drop structural duplicates and order by id.
///
/// When duplicates carry different ids the smallest id is kept.
fn prepare(examples: &[Example]) -> Vec<CanonicalExample> {
    let mut canonical: Vec<CanonicalExample> = examples.iter().map(Example::canonicalize).collect();
    canonical.sort_by(|a, b| a.id.cmp(&b.id));

    let mut seen = HashSet::with_capacity(canonical.len());
    canonical.retain(|example| seen.insert(example.content_key()));
    canonical
}

/// `round(n * ratio)` clamped to `[1, n - 1]`. Requires `n >= 2`.
pub(crate) fn validation_size(n: usize, ratio: f64) -> usize {
    let raw = (n as f64 * ratio).round() as usize;
    raw.clamp(1, n.saturating_sub(1).max(1))
}

/// Highest-scoring candidates first; ties go to the earlier round, then the
/// lexically smaller example id. Candidates that scored 0 are dropped.
fn select_demonstrations(
    train: &[CanonicalExample],
    best: &[Option<Candidate>],
    max_demos: usize,
) -> Vec<Demonstration> {
    let mut ranked: Vec<(&CanonicalExample, &Candidate)> = train
        .iter()
        .zip(best)
        .filter_map(|(example, candidate)| candidate.as_ref().map(|c| (example, c)))
        .filter(|(_, c)| c.score > 0.0)
        .collect();

    ranked.sort_by(|(ea, a), (eb, b)| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then(a.round.cmp(&b.round))
            .then_with(|| ea.id.cmp(&eb.id))
    });

    ranked
        .into_iter()
        .take(max_demos)
        .map(|(example, candidate)| Demonstration {
            input: example.input.to_json(),
            reasoning: candidate.reasoning.clone(),
            output: candidate.output.clone(),
        })
        .collect()
}

fn timeout_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::store::InMemoryArtifactStore;
    use crate::adapters::substrates::{MockBackend, MockResponse};
    use crate::domain::errors::BackendError;
    use crate::domain::models::{AgentRole, PrincessDomain};
    use crate::services::metric::{ExactMatch, FnMetric};
    use serde_json::json;

    fn path() -> CommunicationPath {
        CommunicationPath::new(AgentRole::Princess(PrincessDomain::Development), AgentRole::Drone)
    }

    fn examples(n: usize) -> Vec<Example> {
        (0..n)
            .map(|i| {
                Example::new(
                    format!("ex-{i:02}"),
                    json!({"description": format!("double {i}")}),
                    json!({"value": i * 2}),
                )
            })
            .collect()
    }

    /// Answers `double N` with `2N`, or with garbage for the listed numbers.
    fn doubler(wrong: &'static [usize]) -> MockBackend {
        MockBackend::new().with_responder(move |prompt| {
            let n: usize = prompt
                .user
                .lines()
                .find_map(|l| l.strip_prefix("Description: double "))
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(0);
            let value = if wrong.contains(&n) { n + 1 } else { n * 2 };
            MockResponse::output(&format!("{n} times two"), json!({ "value": value }))
        })
    }

    fn trainer(backend: MockBackend, store: Arc<InMemoryArtifactStore>) -> Trainer {
        Trainer::new(Arc::new(backend), store, TrainerOptions::default())
    }

    #[test]
    fn test_validation_size() {
        assert_eq!(validation_size(10, 0.2), 2);
        assert_eq!(validation_size(3, 0.2), 1);
        assert_eq!(validation_size(2, 0.9), 1);
        assert_eq!(validation_size(5, 0.5), 3);
    }

    #[test]
    fn test_prepare_dedups_and_sorts() {
        let mut data = examples(3);
        data.push(Example::new("ex-00a", json!({"description": "double 1"}), json!({"value": 2})));
        data.reverse();

        let prepared = prepare(&data);
        let ids: Vec<&str> = prepared.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["ex-00", "ex-00a", "ex-02"]);
    }

    #[tokio::test]
    async fn test_train_selects_best_and_persists() {
        let store = Arc::new(InMemoryArtifactStore::new());
        let trainer = trainer(doubler(&[3]), store.clone());

        let artifact = trainer.train(path(), &examples(10), &ExactMatch, 3, 2).await.unwrap();

        assert_eq!(artifact.version, 1);
        assert_eq!(artifact.demonstrations.len(), 3);
        assert_eq!(artifact.demonstrations[0].input, json!({"description": "double 0"}));
        assert_eq!(artifact.demonstrations[2].input, json!({"description": "double 2"}));
        assert!(artifact.demonstrations.iter().all(|d| d.input != json!({"description": "double 3"})));
        assert_eq!(artifact.training_score, 1.0);
        assert_eq!(artifact.metadata.train_examples, 8);
        assert_eq!(artifact.metadata.validation_examples, 2);
        assert_eq!(store.latest_version(&path()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failed_calls_are_skipped() {
        let store = Arc::new(InMemoryArtifactStore::new());
        let backend = doubler(&[]);
        backend.push(MockResponse::failure(BackendError::Unavailable("flaky".to_string())));
        let trainer = trainer(backend, store);

        let artifact = trainer.train(path(), &examples(5), &ExactMatch, 4, 1).await.unwrap();
        assert_eq!(artifact.metadata.skipped_calls, 1);
        assert_eq!(artifact.demonstrations.len(), 3);
    }

    #[tokio::test]
    async fn test_insufficient_data_writes_nothing() {
        let store = Arc::new(InMemoryArtifactStore::new());
        let trainer = trainer(doubler(&[]), store.clone());

        let err = trainer.train(path(), &examples(2), &ExactMatch, 2, 1).await.unwrap_err();
        assert!(matches!(
            err,
            TrainingError::InsufficientTrainingData { survived: 2, required: 3, .. }
        ));
        assert_eq!(store.latest_version(&path()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_all_calls_failing_is_insufficient() {
        let store = Arc::new(InMemoryArtifactStore::new());
        let backend = MockBackend::with_default(MockResponse::failure(BackendError::Unavailable("down".to_string())));
        let trainer = trainer(backend, store.clone());

        let err = trainer.train(path(), &examples(5), &ExactMatch, 2, 2).await.unwrap_err();
        assert!(matches!(err, TrainingError::InsufficientTrainingData { survived: 1, .. }));
        assert!(store.list_paths().await.unwrap().is_empty());
    }

    /// Answers baseline prompts like `doubler`, fails augmented prompts for the listed numbers.
    fn failing_validation(fail: &'static [usize]) -> MockBackend {
        MockBackend::new().with_responder(move |prompt| {
            let n: usize = prompt
                .user
                .lines()
                .find_map(|l| l.strip_prefix("Description: double "))
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(0);
            if prompt.system.contains("Worked examples") && fail.contains(&n) {
                MockResponse::failure(BackendError::Unavailable("validation backend down".to_string()))
            } else {
                MockResponse::output("doubled", json!({ "value": n * 2 }))
            }
        })
    }

    #[tokio::test]
    async fn test_zero_scores_publish_nothing() {
        let store = Arc::new(InMemoryArtifactStore::new());
        let first = trainer(doubler(&[]), store.clone())
            .train(path(), &examples(10), &ExactMatch, 5, 1)
            .await
            .unwrap();
        assert_eq!(first.version, 1);

        let never = FnMetric::new("never", |_: &serde_json::Value, _: &serde_json::Value| 0.0);
        let err = trainer(doubler(&[]), store.clone())
            .train(path(), &examples(10), &never, 5, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, TrainingError::NoDemonstrations { scored: 8, .. }));
        assert!(err.is_insufficient_data());

        let active = store.load_latest(&path()).await.unwrap().unwrap();
        assert_eq!(active.version, 1);
        assert_eq!(active.demonstrations.len(), 5);
    }

    #[tokio::test]
    async fn test_failed_validation_publishes_nothing() {
        let store = Arc::new(InMemoryArtifactStore::new());
        let err = trainer(failing_validation(&[8, 9]), store.clone())
            .train(path(), &examples(10), &ExactMatch, 3, 1)
            .await
            .unwrap_err();

        assert!(matches!(err, TrainingError::ValidationUnavailable { attempted: 2, .. }));
        assert_eq!(store.latest_version(&path()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_partial_validation_failure_scores_zero() {
        let store = Arc::new(InMemoryArtifactStore::new());
        let artifact = trainer(failing_validation(&[9]), store)
            .train(path(), &examples(10), &ExactMatch, 3, 1)
            .await
            .unwrap();

        assert!((artifact.training_score - 0.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_queued_calls_do_not_time_out() {
        let backend = Arc::new(doubler(&[]).with_delay(Duration::from_millis(50)));
        let options = TrainerOptions {
            max_concurrency: 1,
            call_timeout: Duration::from_millis(120),
            ..TrainerOptions::default()
        };
        let trainer = Trainer::new(backend.clone(), Arc::new(InMemoryArtifactStore::new()), options);

        let artifact = trainer.train(path(), &examples(10), &ExactMatch, 5, 1).await.unwrap();
        assert_eq!(artifact.metadata.skipped_calls, 0);
        assert_eq!(artifact.demonstrations.len(), 5);
        assert_eq!(backend.call_count(), 10);
        assert!((artifact.training_score - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_invalid_arguments() {
        let trainer = trainer(doubler(&[]), Arc::new(InMemoryArtifactStore::new()));
        let upward = CommunicationPath::new(AgentRole::Drone, AgentRole::Queen);

        assert!(matches!(
            trainer.train(upward, &examples(5), &ExactMatch, 2, 1).await,
            Err(TrainingError::InvalidArguments(_))
        ));
        assert!(matches!(
            trainer.train(path(), &examples(5), &ExactMatch, 0, 1).await,
            Err(TrainingError::InvalidArguments(_))
        ));
        assert!(matches!(
            trainer.train(path(), &examples(5), &ExactMatch, 2, 0).await,
            Err(TrainingError::InvalidArguments(_))
        ));
    }

    #[tokio::test]
    async fn test_accepted_examples_are_not_retried() {
        let store = Arc::new(InMemoryArtifactStore::new());
        let backend = Arc::new(doubler(&[3]));
        let trainer = Trainer::new(backend.clone(), store, TrainerOptions::default());

        trainer.train(path(), &examples(5), &ExactMatch, 2, 3).await.unwrap();
        // 4 train calls in round 1, then only ex-03 in rounds 2 and 3, then 1 validation call.
        assert_eq!(backend.call_count(), 4 + 1 + 1 + 1);
    }
}
