//! Event sink that forwards delegation events to `tracing`.

use tracing::info;

use crate::domain::models::{DelegationEvent, Outcome};
use crate::domain::ports::EventSink;

/// Emits every event at INFO under the `hivelink::events` target, so the
/// configured subscriber decides where they go (pretty, JSON, rolling file).
#[derive(Debug, Clone, Default)]
pub struct TracingEventSink;

impl TracingEventSink {
    /// Sink logging under the `hivelink::events` target.
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for TracingEventSink {
    fn record(&self, event: DelegationEvent) {
        let outcome = match &event.outcome {
            Outcome::Success => "success",
            Outcome::Failure { kind } => kind.as_str(),
        };
        info!(
            target: "hivelink::events",
            path = %event.path,
            task_id = %event.task_id,
            latency_ms = event.latency_ms,
            optimized = event.optimized,
            artifact_version = event.artifact_version,
            fallback = event.fallback_reason.map(|r| r.as_str()),
            outcome,
            "delegation attempt"
        );
    }
}
