//! Anthropic API backend.
//!
//! Makes direct HTTP calls to the Anthropic Messages API. Much lower fixed
//! overhead than the CLI backend, so this is the one that fits the runtime
//! latency budget.

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::errors::BackendError;
use crate::domain::models::{AnthropicApiBackendConfig, Prompt};
use crate::domain::ports::{BackendClient, Completion, FinishReason};

/// Configuration for the Anthropic API backend.
#[derive(Debug, Clone)]
pub struct AnthropicApiConfig {
    /// API key (will be read from ANTHROPIC_API_KEY env if not set).
    pub api_key: Option<String>,
    /// API base URL.
    pub base_url: String,
    pub model: String,
    /// API version header.
    pub api_version: String,
    /// Max tokens to generate.
    pub max_tokens: u32,
}

impl Default for AnthropicApiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.anthropic.com".to_string(),
            model: "claude-sonnet-4-5-20250929".to_string(),
            api_version: "2023-06-01".to_string(),
            max_tokens: 2048,
        }
    }
}

impl From<&AnthropicApiBackendConfig> for AnthropicApiConfig {
    fn from(config: &AnthropicApiBackendConfig) -> Self {
        let defaults = Self::default();
        Self {
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone().unwrap_or(defaults.base_url),
            model: config.model.clone(),
            api_version: defaults.api_version,
            max_tokens: config.max_tokens,
        }
    }
}

impl AnthropicApiConfig {
    /// Get API key from config or environment.
    pub fn get_api_key(&self) -> Option<String> {
        self.api_key.clone().or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
    }

    /// Use `key` instead of `ANTHROPIC_API_KEY`.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Send requests to `url` instead of the public endpoint.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

/// Cache control marker for Anthropic prompt caching.
#[derive(Debug, Clone, Serialize)]
struct CacheControl {
    #[serde(rename = "type")]
    control_type: &'static str,
}

/// System prompt content block with optional cache_control.
#[derive(Debug, Clone, Serialize)]
struct SystemContentBlock<'a> {
    #[serde(rename = "type")]
    block_type: &'static str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    cache_control: Option<CacheControl>,
}

impl<'a> SystemContentBlock<'a> {
    /// Text block marked for caching. The system block is the artifact
    /// prefix, identical across calls on a path.
    fn cached_text(text: &'a str) -> Self {
        Self {
            block_type: "text",
            text,
            cache_control: Some(CacheControl {
                control_type: "ephemeral",
            }),
        }
    }
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    system: Vec<SystemContentBlock<'a>>,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ResponseBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseBlock>,
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Backend calling the Messages API directly.
pub struct AnthropicApiBackend {
    client: Client,
    config: AnthropicApiConfig,
    api_key: String,
}

impl AnthropicApiBackend {
    /// Build the HTTP client. Fails when no API key is configured.
    pub fn new(config: AnthropicApiConfig) -> Result<Self, BackendError> {
        let api_key = config
            .get_api_key()
            .ok_or_else(|| BackendError::NotConfigured("ANTHROPIC_API_KEY is not set".to_string()))?;

        let client = Client::builder()
            .build()
            .map_err(|e| BackendError::NotConfigured(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    fn map_stop_reason(reason: Option<&str>) -> FinishReason {
        match reason {
            Some("max_tokens") => FinishReason::Length,
            Some("refusal") => FinishReason::Error,
            _ => FinishReason::Stop,
        }
    }
}

#[async_trait]
impl BackendClient for AnthropicApiBackend {
    fn name(&self) -> &'static str {
        "anthropic_api"
    }

    async fn complete(&self, prompt: &Prompt, deadline: Duration) -> Result<Completion, BackendError> {
        let deadline_ms = u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX);
        let system = if prompt.system.is_empty() {
            vec![]
        } else {
            vec![SystemContentBlock::cached_text(&prompt.system)]
        };
        let request = MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            system,
            messages: vec![Message {
                role: "user",
                content: &prompt.user,
            }],
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.config.base_url))
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.config.api_version)
            .timeout(deadline)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BackendError::Timeout(deadline_ms)
                } else {
                    BackendError::Unavailable(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(BackendError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: MessagesResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                BackendError::Timeout(deadline_ms)
            } else {
                BackendError::InvalidResponse(e.to_string())
            }
        })?;

        let text = parsed
            .content
            .into_iter()
            .filter_map(|block| match block {
                ResponseBlock::Text { text } => Some(text),
                ResponseBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("");

        Ok(Completion {
            text,
            finish_reason: Self::map_stop_reason(parsed.stop_reason.as_deref()),
        })
    }
}
