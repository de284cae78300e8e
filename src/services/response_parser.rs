//! Parse backend completions into structured results.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a completion could not be parsed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("response is {size} bytes, limit is {limit}")]
    TooLarge { size: usize, limit: usize },

    #[error("response contains no JSON object")]
    NoJsonObject,

    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("response object has no \"output\" field")]
    MissingOutput,
}

/// Structured answer extracted from a completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedResponse {
    pub output: serde_json::Value,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

const fn default_success() -> bool {
    true
}

/// Extracts the structured result from completion text.
#[derive(Debug, Clone, Copy)]
pub struct ResponseParser {
    max_bytes: usize,
}

impl ResponseParser {
    /// Parser rejecting completions larger than `max_bytes`.
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }

    /// Extract the JSON object from `text`.
    ///
    /// Accepts a bare object, an object inside a fenced code block, or an
    /// object surrounded by prose. Work is linear in the input size, which
    /// is capped.
    pub fn parse(&self, text: &str) -> Result<ParsedResponse, ParseError> {
        if text.len() > self.max_bytes {
            return Err(ParseError::TooLarge {
                size: text.len(),
                limit: self.max_bytes,
            });
        }

        let candidate = extract_object(text).ok_or(ParseError::NoJsonObject)?;
        let value: serde_json::Value =
            serde_json::from_str(candidate).map_err(|e| ParseError::InvalidJson(e.to_string()))?;

        let object = value.as_object().ok_or(ParseError::NoJsonObject)?;
        if !object.contains_key("output") {
            return Err(ParseError::MissingOutput);
        }

        serde_json::from_value(value).map_err(|e| ParseError::InvalidJson(e.to_string()))
    }
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new(65_536)
    }
}

fn extract_object(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    (end > start).then(|| &trimmed[start..=end])
}
