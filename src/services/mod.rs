//! Application services: routing, transport, optimization and training.

pub mod artifact_cache;
pub mod call_limiter;
pub mod circuit_breaker;
pub mod dataset;
pub mod delegating_agent;
pub mod metric;
pub mod optimizer_middleware;
pub mod prompt;
pub mod response_parser;
pub mod routing;
pub mod trainer;
pub mod transport;

pub use artifact_cache::{ArtifactCache, CacheEntry};
pub use call_limiter::CallLimiter;
pub use circuit_breaker::{CircuitBreakerConfig, CircuitBreakerService, CircuitState};
pub use dataset::{load_dataset, parse_dataset, DatasetFormat};
pub use delegating_agent::{DelegatingAgent, PlanError};
pub use metric::{ExactMatch, FieldOverlap, FnMetric, Metric};
pub use optimizer_middleware::{OptimizationMiddleware, DEFAULT_LATENCY_BUDGET};
pub use prompt::{CompiledArtifact, PromptBuilder};
pub use response_parser::{ParseError, ParsedResponse, ResponseParser};
pub use routing::{Route, RoutingTable};
pub use trainer::{Trainer, TrainerOptions};
pub use transport::{AttemptMeta, TransportProtocol};
