//! Domain models.

pub mod agent;
pub mod artifact;
pub mod config;
pub mod event;
pub mod example;
pub mod path;
pub mod prompt;
pub mod quality;
pub mod task;

pub use agent::{AgentIdentity, AgentRole, AgentTier, PrincessDomain};
pub use artifact::{Demonstration, OptimizerArtifact, TrainingMetadata};
pub use config::{
    AnthropicApiBackendConfig, BackendConfig, BackendKind, BreakerConfig, ClaudeCodeBackendConfig,
    Config, LoggingConfig, MockBackendConfig, StoreConfig, StoreKind, TrainerConfig,
    TransportConfig,
};
pub use event::{DelegationEvent, FallbackReason, Outcome};
pub use example::{CanonicalExample, CanonicalValue, Example};
pub use path::CommunicationPath;
pub use prompt::Prompt;
pub use quality::{QualityFinding, QualityReport, Severity};
pub use task::{Task, TaskResult, DEFAULT_PRIORITY, DEFAULT_TASK_TIMEOUT_MS};
