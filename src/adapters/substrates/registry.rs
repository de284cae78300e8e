//! Backend registry and factory.

use std::sync::Arc;

use crate::domain::errors::BackendError;
use crate::domain::models::{BackendConfig, BackendKind};
use crate::domain::ports::BackendClient;

use super::anthropic_api::{AnthropicApiBackend, AnthropicApiConfig};
use super::claude_code::{ClaudeCodeBackend, ClaudeCodeConfig};
use super::mock::{MockBackend, MockResponse};

/// Builds backends from configuration.
pub struct BackendRegistry {
    config: BackendConfig,
}

impl BackendRegistry {
    /// Registry over the configured backends.
    pub fn new(config: BackendConfig) -> Self {
        Self { config }
    }

    /// Create the configured default backend.
    pub fn default_backend(&self) -> Result<Arc<dyn BackendClient>, BackendError> {
        self.create_by_kind(self.config.kind)
    }

    /// Create a backend by kind.
    ///
    /// Unlike the CLI backend, the API backend cannot start without a key and
    /// reports `NotConfigured` instead of falling back silently.
    pub fn create_by_kind(&self, kind: BackendKind) -> Result<Arc<dyn BackendClient>, BackendError> {
        match kind {
            BackendKind::ClaudeCode => Ok(Arc::new(ClaudeCodeBackend::new(ClaudeCodeConfig::from(
                &self.config.claude_code,
            )))),
            BackendKind::AnthropicApi => Ok(Arc::new(AnthropicApiBackend::new(AnthropicApiConfig::from(
                &self.config.anthropic_api,
            ))?)),
            BackendKind::Mock => {
                let mock = &self.config.mock;
                Ok(Arc::new(
                    MockBackend::with_default(MockResponse::text(mock.response.clone()))
                        .with_delay(std::time::Duration::from_millis(mock.delay_ms)),
                ))
            }
        }
    }

    /// Create a backend by its configuration name.
    pub fn create(&self, kind: &str) -> Result<Arc<dyn BackendClient>, BackendError> {
        let kind = match kind {
            "claude_code" | "claude-code" => BackendKind::ClaudeCode,
            "anthropic_api" | "anthropic-api" => BackendKind::AnthropicApi,
            "mock" => BackendKind::Mock,
            other => return Err(BackendError::NotConfigured(format!("unknown backend kind '{other}'"))),
        };
        self.create_by_kind(kind)
    }
}
