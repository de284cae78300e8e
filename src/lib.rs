//! Hivelink - hierarchical agent delegation
//!
//! A Queen delegates to domain Princesses, which delegate to Drones. Every
//! hop goes through a circuit-broken, deadline-bounded transport, and an
//! optimization middleware can swap the baseline prompt for one shaped by an
//! offline-trained optimizer artifact.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): roles, paths, tasks, artifacts, errors and ports
//! - **Service Layer** (`services`): routing, transport, circuit breakers,
//!   artifact cache, optimization middleware, trainer and delegating agents
//! - **Adapters** (`adapters`): backends, artifact stores, event sinks
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use hivelink::adapters::substrates::MockBackend;
//! use hivelink::services::RoutingTable;
//!
//! let routes = RoutingTable::full_hierarchy(Arc::new(MockBackend::new()));
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{ArtifactError, BackendError, DelegationError, RoutingError, TaskError, TrainingError};
pub use domain::models::{
    AgentIdentity, AgentRole, CommunicationPath, Config, Example, OptimizerArtifact, PrincessDomain, Task,
    TaskResult,
};
pub use domain::ports::{ArtifactStore, BackendClient, EventSink, QualityAnalyzer};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{DelegatingAgent, OptimizationMiddleware, Trainer, TransportProtocol};
