//! Shared fixtures for integration tests.
#![allow(dead_code)]

use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use hivelink::adapters::events::MemoryEventSink;
use hivelink::adapters::substrates::{MockBackend, MockResponse};
use hivelink::domain::models::{
    AgentRole, CommunicationPath, Demonstration, Example, OptimizerArtifact, PrincessDomain, TrainingMetadata,
};
use hivelink::domain::ports::{ArtifactStore, BackendClient};
use hivelink::services::{
    ArtifactCache, CircuitBreakerConfig, CircuitBreakerService, OptimizationMiddleware, ResponseParser, RoutingTable,
    TransportProtocol,
};

pub const DEV: AgentRole = AgentRole::Princess(PrincessDomain::Development);

pub fn queen_to_dev() -> CommunicationPath {
    CommunicationPath::new(AgentRole::Queen, DEV)
}

/// Everything a delegation test needs to look at afterwards.
pub struct Stack {
    pub middleware: OptimizationMiddleware,
    pub backend: Arc<MockBackend>,
    pub sink: Arc<MemoryEventSink>,
    pub breakers: Arc<CircuitBreakerService>,
    pub cache: Arc<ArtifactCache>,
}

pub fn stack(backend: MockBackend, store: Arc<dyn ArtifactStore>, breaker: CircuitBreakerConfig) -> Stack {
    let backend = Arc::new(backend);
    let client: Arc<dyn BackendClient> = backend.clone();
    let sink = Arc::new(MemoryEventSink::new());
    let breakers = Arc::new(CircuitBreakerService::new(breaker));
    let transport = TransportProtocol::new(
        RoutingTable::full_hierarchy(client),
        breakers.clone(),
        sink.clone(),
        ResponseParser::default(),
    );
    let cache = Arc::new(ArtifactCache::new(store));
    let middleware =
        OptimizationMiddleware::new(Arc::new(transport), cache.clone()).with_latency_budget(Duration::from_millis(250));
    Stack {
        middleware,
        backend,
        sink,
        breakers,
        cache,
    }
}

pub fn artifact(path: CommunicationPath, version: u64) -> OptimizerArtifact {
    OptimizerArtifact {
        path,
        instruction: "Break the request into independently testable steps.".to_string(),
        demonstrations: vec![Demonstration {
            input: json!({"description": "add login"}),
            reasoning: "session first, then form".to_string(),
            output: json!({"steps": ["session", "form"]}),
        }],
        training_score: 0.9,
        version,
        created_at: Utc::now(),
        metadata: TrainingMetadata::default(),
    }
}

/// `count` examples asking to double their index.
pub fn doubling_examples(count: usize) -> Vec<Example> {
    (0..count)
        .map(|i| {
            Example::new(
                format!("ex-{i:02}"),
                json!({ "description": format!("double {i}") }),
                json!({ "value": i * 2 }),
            )
        })
        .collect()
}

/// Answers `double N` with `2N`, or `N + 1` for the listed numbers.
pub fn doubler(wrong: &'static [usize]) -> MockBackend {
    MockBackend::new().with_responder(move |prompt| {
        let n: usize = prompt
            .user
            .lines()
            .find_map(|l| l.strip_prefix("Description: double "))
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0);
        let value = if wrong.contains(&n) { n + 1 } else { n * 2 };
        MockResponse::output(&format!("{n} doubled"), json!({ "value": value }))
    })
}
