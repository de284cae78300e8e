//! Optimization middleware between a delegating agent and the transport.
//!
//! Applies the cached artifact for a path when one exists and falls back to
//! the baseline prompt when it does not. Artifact problems never become task
//! failures. Transport failures pass through unchanged.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

use super::artifact_cache::{ArtifactCache, CacheEntry};
use super::prompt::PromptBuilder;
use super::transport::{duration_ms, AttemptMeta, TransportProtocol};
use crate::domain::errors::DelegationError;
use crate::domain::models::{AgentRole, CommunicationPath, FallbackReason, Task, TaskResult, TransportConfig};

/// Default ceiling on one optimized delegation, independent of task timeout.
pub const DEFAULT_LATENCY_BUDGET: Duration = Duration::from_millis(250);

/// Applies trained optimizer artifacts to delegations.
///
/// Sits between a [`DelegatingAgent`](super::DelegatingAgent) and the
/// [`TransportProtocol`]. Shared by every agent through an `Arc`.
pub struct OptimizationMiddleware {
    transport: Arc<TransportProtocol>,
    cache: Arc<ArtifactCache>,
    latency_budget: Duration,
}

impl OptimizationMiddleware {
    /// Middleware with the default latency budget.
    pub fn new(transport: Arc<TransportProtocol>, cache: Arc<ArtifactCache>) -> Self {
        Self {
            transport,
            cache,
            latency_budget: DEFAULT_LATENCY_BUDGET,
        }
    }

    /// Override the default 250 ms latency budget.
    pub fn with_latency_budget(mut self, budget: Duration) -> Self {
        self.latency_budget = budget;
        self
    }

    /// Take the latency budget from configuration.
    pub fn with_transport_config(self, config: &TransportConfig) -> Self {
        self.with_latency_budget(Duration::from_millis(config.latency_budget_ms))
    }

    /// Underlying transport.
    pub fn transport(&self) -> &Arc<TransportProtocol> {
        &self.transport
    }

    /// Artifact cache.
    pub fn cache(&self) -> &Arc<ArtifactCache> {
        &self.cache
    }

    /// Ceiling on one optimized delegation.
    pub fn latency_budget(&self) -> Duration {
        self.latency_budget
    }

    /// Deliver `task` from `source` to `destination`, optimized when possible.
    ///
    /// The whole call, including a baseline retry after a malformed optimized
    /// response, fits in `min(task.timeout, latency_budget)`.
    #[instrument(skip(self, task), fields(task_id = %task.id))]
    pub async fn optimize_and_send(
        &self,
        source: AgentRole,
        destination: AgentRole,
        task: &Task,
    ) -> Result<TaskResult, DelegationError> {
        let path = CommunicationPath::new(source, destination);
        let started = Instant::now();
        let deadline = task.timeout().min(self.latency_budget);

        let (prompt, meta) = match self.cache.get(&path).await {
            CacheEntry::Present(compiled) => (compiled.augment(task), AttemptMeta::optimized(compiled.version())),
            CacheEntry::Absent(reason) => (PromptBuilder::baseline(&path, task), AttemptMeta::baseline(Some(reason))),
        };

        let first = self.transport.dispatch(path, task, &prompt, deadline, meta).await;

        match first {
            Err(DelegationError::MalformedResponse { .. }) if meta.artifact_version.is_some() => {
                let remaining = deadline.saturating_sub(started.elapsed());
                if remaining.is_zero() {
                    return Err(DelegationError::Timeout {
                        path,
                        after_ms: duration_ms(deadline),
                    });
                }

                debug!(%path, remaining_ms = duration_ms(remaining), "optimized response malformed, retrying with baseline");
                let baseline = PromptBuilder::baseline(&path, task);
                self.transport
                    .dispatch(
                        path,
                        task,
                        &baseline,
                        remaining,
                        AttemptMeta::baseline(Some(FallbackReason::MalformedRetry)),
                    )
                    .await
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::events::MemoryEventSink;
    use crate::adapters::store::InMemoryArtifactStore;
    use crate::adapters::substrates::{MockBackend, MockResponse};
    use crate::domain::models::{Demonstration, OptimizerArtifact, PrincessDomain, TrainingMetadata};
    use crate::domain::ports::{ArtifactStore, BackendClient};
    use crate::services::circuit_breaker::CircuitBreakerService;
    use crate::services::response_parser::ResponseParser;
    use crate::services::routing::RoutingTable;
    use chrono::Utc;
    use serde_json::json;

    const PRINCESS: AgentRole = AgentRole::Princess(PrincessDomain::Development);

    fn path() -> CommunicationPath {
        CommunicationPath::new(AgentRole::Queen, PRINCESS)
    }

    fn artifact() -> OptimizerArtifact {
        OptimizerArtifact {
            path: path(),
            instruction: "Split work into drone tasks.".to_string(),
            demonstrations: vec![Demonstration {
                input: json!({"description": "add search"}),
                reasoning: "index then query".to_string(),
                output: json!({"steps": ["index", "query"]}),
            }],
            training_score: 1.0,
            version: 4,
            created_at: Utc::now(),
            metadata: TrainingMetadata::default(),
        }
    }

    struct Harness {
        middleware: OptimizationMiddleware,
        backend: Arc<MockBackend>,
        sink: Arc<MemoryEventSink>,
    }

    async fn harness(backend: MockBackend, with_artifact: bool) -> Harness {
        let backend = Arc::new(backend);
        let sink = Arc::new(MemoryEventSink::new());
        let store = Arc::new(InMemoryArtifactStore::new());
        if with_artifact {
            store.save(&artifact()).await.unwrap();
        }
        let client: Arc<dyn BackendClient> = backend.clone();
        let transport = TransportProtocol::new(
            RoutingTable::full_hierarchy(client),
            Arc::new(CircuitBreakerService::with_defaults()),
            sink.clone(),
            ResponseParser::default(),
        );
        let middleware = OptimizationMiddleware::new(Arc::new(transport), Arc::new(ArtifactCache::new(store)))
            .with_latency_budget(Duration::from_secs(2));
        Harness {
            middleware,
            backend,
            sink,
        }
    }

    fn task() -> Task {
        Task::new("decompose", "Add full-text search").unwrap()
    }

    #[tokio::test]
    async fn test_uses_artifact_when_present() {
        let h = harness(MockBackend::with_default(MockResponse::output("ok", json!({"steps": 2}))), true).await;

        let result = h.middleware.optimize_and_send(AgentRole::Queen, PRINCESS, &task()).await.unwrap();
        assert!(result.optimized);
        assert_eq!(result.artifact_version, Some(4));

        let prompt = &h.backend.prompts()[0];
        assert!(prompt.system.starts_with("Split work into drone tasks."));
        assert!(prompt.system.contains("index then query"));

        let events = h.sink.events();
        assert!(events[0].optimized);
        assert_eq!(events[0].artifact_version, Some(4));
    }

    #[tokio::test]
    async fn test_baseline_without_artifact() {
        let h = harness(MockBackend::new(), false).await;
        let task = task();

        let result = h.middleware.optimize_and_send(AgentRole::Queen, PRINCESS, &task).await.unwrap();
        assert!(!result.optimized);
        assert_eq!(h.backend.prompts()[0], PromptBuilder::baseline(&path(), &task));
        assert_eq!(h.sink.events()[0].fallback_reason, Some(FallbackReason::NoArtifact));
    }

    #[tokio::test]
    async fn test_malformed_optimized_response_retries_baseline_once() {
        let backend = MockBackend::new();
        backend.push(MockResponse::text("I would split it into two steps."));
        let h = harness(backend, true).await;
        let task = task();

        let result = h.middleware.optimize_and_send(AgentRole::Queen, PRINCESS, &task).await.unwrap();
        assert!(!result.optimized);
        assert_eq!(h.backend.call_count(), 2);
        assert_eq!(h.backend.prompts()[1], PromptBuilder::baseline(&path(), &task));

        let events = h.sink.events();
        assert_eq!(events.len(), 2);
        assert!(!events[0].outcome.is_success());
        assert_eq!(events[1].fallback_reason, Some(FallbackReason::MalformedRetry));
    }

    #[tokio::test]
    async fn test_malformed_twice_is_malformed() {
        let h = harness(MockBackend::with_default(MockResponse::text("no json here")), true).await;

        let err = h
            .middleware
            .optimize_and_send(AgentRole::Queen, PRINCESS, &task())
            .await
            .unwrap_err();
        assert!(matches!(err, DelegationError::MalformedResponse { .. }));
        assert_eq!(h.backend.call_count(), 2);
    }

    #[tokio::test]
    async fn test_malformed_baseline_is_not_retried() {
        let h = harness(MockBackend::with_default(MockResponse::text("no json here")), false).await;

        let err = h
            .middleware
            .optimize_and_send(AgentRole::Queen, PRINCESS, &task())
            .await
            .unwrap_err();
        assert!(matches!(err, DelegationError::MalformedResponse { .. }));
        assert_eq!(h.backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_deadline_is_min_of_timeout_and_budget() {
        let backend = MockBackend::new().with_delay(Duration::from_millis(300));
        let h = harness(backend, false).await;
        let middleware = h.middleware.with_latency_budget(Duration::from_millis(50));

        let err = middleware
            .optimize_and_send(AgentRole::Queen, PRINCESS, &task())
            .await
            .unwrap_err();
        assert!(matches!(err, DelegationError::Timeout { after_ms: 50, .. }));

        let short = task().with_timeout(Duration::from_millis(20)).unwrap();
        let err = middleware
            .optimize_and_send(AgentRole::Queen, PRINCESS, &short)
            .await
            .unwrap_err();
        assert!(matches!(err, DelegationError::Timeout { after_ms: 20, .. }));
    }
}
