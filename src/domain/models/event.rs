//! Delegation events emitted to observability sinks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::path::CommunicationPath;
use crate::domain::errors::DelegationError;

/// How a single delegation attempt ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure { kind: String },
}

impl Outcome {
    /// Whether the attempt delivered a result.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl From<&DelegationError> for Outcome {
    fn from(err: &DelegationError) -> Self {
        Self::Failure {
            kind: err.kind().to_string(),
        }
    }
}

/// Why an optimized prompt was not used for an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    /// No artifact exists for the path.
    NoArtifact,
    /// The stored artifact could not be loaded or failed validation.
    ArtifactUnusable,
    /// The optimized response was malformed and the baseline was retried.
    MalformedRetry,
}

impl FallbackReason {
    /// Snake-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoArtifact => "no_artifact",
            Self::ArtifactUnusable => "artifact_unusable",
            Self::MalformedRetry => "malformed_retry",
        }
    }
}

/// One delegation attempt as seen by the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelegationEvent {
    pub path: CommunicationPath,
    pub task_id: Uuid,
    pub latency_ms: u64,
    pub optimized: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_version: Option<u64>,
    pub outcome: Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<FallbackReason>,
    pub recorded_at: DateTime<Utc>,
}

impl DelegationEvent {
    /// Event for an attempt that used the baseline prompt.
    pub fn new(path: CommunicationPath, task_id: Uuid, latency_ms: u64, outcome: Outcome) -> Self {
        Self {
            path,
            task_id,
            latency_ms,
            optimized: false,
            artifact_version: None,
            outcome,
            fallback_reason: None,
            recorded_at: Utc::now(),
        }
    }

    /// Record the artifact version used, if any.
    pub fn with_optimization(mut self, artifact_version: Option<u64>) -> Self {
        self.optimized = artifact_version.is_some();
        self.artifact_version = artifact_version;
        self
    }

    /// Record why the attempt ran on the baseline prompt.
    pub fn with_fallback(mut self, reason: Option<FallbackReason>) -> Self {
        self.fallback_reason = reason;
        self
    }
}
