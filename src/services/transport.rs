//! Transport protocol: deliver a task along a path under a deadline.
//!
//! All breaker accounting, deadline enforcement and failure classification
//! for a delegation happens here. Callers never retry on their own; the
//! optimization middleware's single baseline retry also goes back through
//! [`TransportProtocol::dispatch`].

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

use super::circuit_breaker::{with_circuit_breaker, CircuitBreakerError, CircuitBreakerService};
use super::prompt::PromptBuilder;
use super::response_parser::{ParsedResponse, ResponseParser};
use super::routing::RoutingTable;
use crate::domain::errors::{BackendError, DelegationError};
use crate::domain::models::{
    AgentIdentity, CommunicationPath, DelegationEvent, FallbackReason, Outcome, Prompt, Task, TaskResult,
};
use crate::domain::ports::{EventSink, FinishReason};

/// Optimization context of one attempt, carried into the emitted event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttemptMeta {
    pub artifact_version: Option<u64>,
    pub fallback_reason: Option<FallbackReason>,
}

impl AttemptMeta {
    /// Attempt using artifact `version`.
    pub fn optimized(version: u64) -> Self {
        Self {
            artifact_version: Some(version),
            fallback_reason: None,
        }
    }

    /// Baseline attempt, with the reason no artifact applied.
    pub fn baseline(reason: Option<FallbackReason>) -> Self {
        Self {
            artifact_version: None,
            fallback_reason: reason,
        }
    }
}

/// Delivers tasks along communication paths.
///
/// Owns the routing table and shares the breaker service and event sink.
/// Every attempt, optimized or not, is accounted for here.
pub struct TransportProtocol {
    routes: RoutingTable,
    breakers: Arc<CircuitBreakerService>,
    sink: Arc<dyn EventSink>,
    parser: ResponseParser,
}

impl TransportProtocol {
    /// Transport over `routes`, charging outcomes to `breakers`.
    pub fn new(
        routes: RoutingTable,
        breakers: Arc<CircuitBreakerService>,
        sink: Arc<dyn EventSink>,
        parser: ResponseParser,
    ) -> Self {
        Self {
            routes,
            breakers,
            sink,
            parser,
        }
    }

    /// Routing table.
    pub fn routes(&self) -> &RoutingTable {
        &self.routes
    }

    /// Shared breaker service.
    pub fn breakers(&self) -> &Arc<CircuitBreakerService> {
        &self.breakers
    }

    /// Deliver `task` from `source` to `destination` with a baseline prompt.
    pub async fn send(
        &self,
        source: &AgentIdentity,
        destination: &AgentIdentity,
        task: &Task,
        timeout: Duration,
    ) -> Result<TaskResult, DelegationError> {
        let path = CommunicationPath::new(source.role(), destination.role());
        let prompt = PromptBuilder::baseline(&path, task);
        self.dispatch(path, task, &prompt, timeout, AttemptMeta::default()).await
    }

    /// Deliver a prepared prompt along `path`.
    ///
    /// Blocked circuits fail with `CircuitOpen` without touching the backend.
    /// Timeouts, backend errors and unparsable responses are charged to the
    /// path's breaker. A missing route is not.
    #[instrument(skip_all, fields(path = %path, task_id = %task.id))]
    pub async fn dispatch(
        &self,
        path: CommunicationPath,
        task: &Task,
        prompt: &Prompt,
        deadline: Duration,
        meta: AttemptMeta,
    ) -> Result<TaskResult, DelegationError> {
        let started = Instant::now();

        let Some(route) = self.routes.get(&path) else {
            let err = DelegationError::DestinationUnreachable {
                path,
                reason: "no route configured".to_string(),
            };
            self.emit(path, task, started, &Err(err.clone()), meta);
            return Err(err);
        };

        let backend = Arc::clone(&route.backend);
        let parser = self.parser;
        let after_ms = duration_ms(deadline);

        debug!(
            backend = backend.name(),
            deadline_ms = after_ms,
            prompt_bytes = prompt.len(),
            optimized = meta.artifact_version.is_some(),
            "dispatching task"
        );

        let attempt = async move {
            let completion = match tokio::time::timeout(deadline, backend.complete(prompt, deadline)).await {
                Err(_) | Ok(Err(BackendError::Timeout(_))) => {
                    return Err(DelegationError::Timeout { path, after_ms });
                }
                Ok(Err(e)) => {
                    return Err(DelegationError::DestinationUnreachable {
                        path,
                        reason: e.to_string(),
                    });
                }
                Ok(Ok(completion)) => completion,
            };

            match completion.finish_reason {
                FinishReason::Error => Err(DelegationError::DestinationUnreachable {
                    path,
                    reason: format!("backend reported an error: {}", first_line(&completion.text)),
                }),
                FinishReason::Stop | FinishReason::Length => {
                    parser
                        .parse(&completion.text)
                        .map_err(|e| DelegationError::MalformedResponse {
                            path,
                            reason: e.to_string(),
                        })
                }
            }
        };

        let outcome = with_circuit_breaker(&self.breakers, path, attempt)
            .await
            .map_err(|e| match e {
                CircuitBreakerError::CircuitOpen { path, retry_after, .. } => {
                    DelegationError::CircuitOpen { path, retry_after }
                }
                CircuitBreakerError::OperationFailed(e) => e,
            });

        let latency_ms = self.emit(path, task, started, &outcome, meta);

        match outcome {
            Ok(parsed) => Ok(to_result(task, parsed, latency_ms).with_optimization(meta.artifact_version)),
            Err(err) => {
                warn!(error = %err, kind = err.kind(), latency_ms, "delegation failed");
                Err(err)
            }
        }
    }

    fn emit(
        &self,
        path: CommunicationPath,
        task: &Task,
        started: Instant,
        outcome: &Result<ParsedResponse, DelegationError>,
        meta: AttemptMeta,
    ) -> u64 {
        let latency_ms = duration_ms(started.elapsed());
        let result = match outcome {
            Ok(_) => Outcome::Success,
            Err(err) => Outcome::from(err),
        };
        self.sink.record(
            DelegationEvent::new(path, task.id, latency_ms, result)
                .with_optimization(meta.artifact_version)
                .with_fallback(meta.fallback_reason),
        );
        latency_ms
    }
}

fn to_result(task: &Task, parsed: ParsedResponse, latency_ms: u64) -> TaskResult {
    if parsed.success {
        TaskResult::success(task.id, parsed.output, latency_ms)
    } else {
        let mut result = TaskResult::failure(
            task.id,
            parsed.error.unwrap_or_else(|| "destination reported failure".to_string()),
            latency_ms,
        );
        result.output = parsed.output;
        result
    }
}

fn first_line(text: &str) -> &str {
    let line = text.lines().next().unwrap_or_default();
    match line.char_indices().nth(200) {
        Some((idx, _)) => &line[..idx],
        None => line,
    }
}

pub(crate) fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
