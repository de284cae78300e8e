//! Port trait definitions (Hexagonal Architecture)
//!
//! Interfaces the services depend on and adapters implement:
//! - BackendClient: language-model completions
//! - ArtifactStore: versioned optimizer artifacts
//! - EventSink: delegation observability
//! - QualityAnalyzer: external static analysis

pub mod artifact_store;
pub mod backend;
pub mod event_sink;
pub mod null_event_sink;
pub mod quality_analyzer;

pub use artifact_store::ArtifactStore;
pub use backend::{BackendClient, Completion, FinishReason};
pub use event_sink::EventSink;
pub use null_event_sink::NullEventSink;
pub use quality_analyzer::QualityAnalyzer;
