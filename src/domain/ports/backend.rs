//! Backend port - interface for language-model backends.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::errors::BackendError;
use crate::domain::models::Prompt;

/// Why the backend stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinishReason {
    Stop,
    Length,
    Error,
}

/// Raw completion returned by a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    pub text: String,
    pub finish_reason: FinishReason,
}

impl Completion {
    /// Completion that ended normally.
    pub fn stop(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            finish_reason: FinishReason::Stop,
        }
    }

    /// Completion the backend flagged as an error.
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            finish_reason: FinishReason::Error,
        }
    }
}

/// Trait for language-model backends.
///
/// Implementations must honor `deadline` on their own. A subprocess backend
/// kills its child once the deadline passes; an HTTP backend sets a request
/// timeout. Callers additionally wrap the future in `tokio::time::timeout`.
#[async_trait]
pub trait BackendClient: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Send `prompt` and wait at most `deadline` for a completion.
    async fn complete(&self, prompt: &Prompt, deadline: Duration) -> Result<Completion, BackendError>;

    /// Check the backend is installed and configured.
    async fn health_check(&self) -> Result<(), BackendError> {
        Ok(())
    }
}
