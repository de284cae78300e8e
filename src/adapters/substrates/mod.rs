//! Language-model backend implementations.

pub mod anthropic_api;
pub mod claude_code;
pub mod mock;
pub mod registry;

pub use anthropic_api::{AnthropicApiBackend, AnthropicApiConfig};
pub use claude_code::{ClaudeCodeBackend, ClaudeCodeConfig};
pub use mock::{MockBackend, MockResponse};
pub use registry::BackendRegistry;
