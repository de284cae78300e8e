//! Domain errors for the hivelink delegation system.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::models::CommunicationPath;

/// Failures surfaced by the transport to a delegating agent.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DelegationError {
    #[error("Circuit open for {path}, retry after {retry_after}")]
    CircuitOpen {
        path: CommunicationPath,
        retry_after: DateTime<Utc>,
    },

    #[error("Delegation on {path} timed out after {after_ms}ms")]
    Timeout { path: CommunicationPath, after_ms: u64 },

    #[error("Destination unreachable on {path}: {reason}")]
    DestinationUnreachable {
        path: CommunicationPath,
        reason: String,
    },

    #[error("Malformed response on {path}: {reason}")]
    MalformedResponse {
        path: CommunicationPath,
        reason: String,
    },
}

impl DelegationError {
    /// Path the failed attempt was made on.
    pub fn path(&self) -> &CommunicationPath {
        match self {
            Self::CircuitOpen { path, .. }
            | Self::Timeout { path, .. }
            | Self::DestinationUnreachable { path, .. }
            | Self::MalformedResponse { path, .. } => path,
        }
    }

    /// Stable snake_case name used in events and CLI output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CircuitOpen { .. } => "circuit_open",
            Self::Timeout { .. } => "timeout",
            Self::DestinationUnreachable { .. } => "destination_unreachable",
            Self::MalformedResponse { .. } => "malformed_response",
        }
    }

    /// Whether another destination may succeed where this one failed.
    pub fn is_failover_candidate(&self) -> bool {
        matches!(
            self,
            Self::CircuitOpen { .. } | Self::Timeout { .. } | Self::DestinationUnreachable { .. }
        )
    }
}

/// Errors raised while loading or persisting optimizer artifacts.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Failed to load artifact from {location}: {reason}")]
    Load { location: String, reason: String },

    #[error("Artifact failed validation: {0}")]
    Invalid(String),

    #[error("Artifact version {version} already exists for {path}")]
    VersionConflict { path: CommunicationPath, version: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for ArtifactError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}

/// Errors raised by the offline trainer.
#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("Insufficient training data for {path}: {survived} usable example(s), {required} required")]
    InsufficientTrainingData {
        path: CommunicationPath,
        survived: usize,
        required: usize,
    },

    #[error("No usable demonstrations for {path}: all {scored} scored candidate(s) scored 0")]
    NoDemonstrations { path: CommunicationPath, scored: usize },

    #[error("Validation failed for {path}: none of {attempted} validation call(s) completed")]
    ValidationUnavailable { path: CommunicationPath, attempted: usize },

    #[error("Invalid training arguments: {0}")]
    InvalidArguments(String),

    #[error("Invalid dataset: {0}")]
    InvalidDataset(String),

    #[error("Artifact store error: {0}")]
    Store(#[from] ArtifactError),
}

impl TrainingError {
    /// Whether the run was aborted for lack of usable data. The previously
    /// active artifact stays in place.
    pub fn is_insufficient_data(&self) -> bool {
        matches!(
            self,
            Self::InsufficientTrainingData { .. } | Self::NoDemonstrations { .. } | Self::ValidationUnavailable { .. }
        )
    }
}

/// Errors raised while building the routing table.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RoutingError {
    #[error("Unknown agent role: {0}")]
    UnknownRole(String),

    #[error("Invalid path specification '{0}', expected <source>:<destination>")]
    InvalidPathSpec(String),

    #[error("Route {0} does not delegate down the hierarchy")]
    InvalidDirection(CommunicationPath),

    #[error("Route {0} is declared more than once")]
    DuplicateRoute(CommunicationPath),
}

/// Errors raised when constructing a task.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskError {
    #[error("Task description cannot be empty")]
    EmptyDescription,

    #[error("Invalid priority: {0} (must be 0-10)")]
    InvalidPriority(u8),

    #[error("Task timeout must be greater than zero")]
    ZeroTimeout,

    #[error("Task cannot depend on itself")]
    SelfDependency,
}

/// Errors raised by a language-model backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("Backend call exceeded its deadline of {0}ms")]
    Timeout(u64),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Backend process failed: {0}")]
    Process(String),

    #[error("Backend not configured: {0}")]
    NotConfigured(String),

    #[error("Invalid backend response: {0}")]
    InvalidResponse(String),
}
