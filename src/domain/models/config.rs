//! Configuration model, deserialized by the config loader.

use serde::{Deserialize, Serialize};

use super::agent::{AgentRole, PrincessDomain};

/// Main configuration structure for hivelink
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Transport deadlines and response limits
    #[serde(default)]
    pub transport: TransportConfig,

    /// Circuit breaker tuning
    #[serde(default)]
    pub circuit_breaker: BreakerConfig,

    /// Optimizer artifact storage
    #[serde(default)]
    pub store: StoreConfig,

    /// Offline trainer settings
    #[serde(default)]
    pub trainer: TrainerConfig,

    /// Language-model backend
    #[serde(default)]
    pub backend: BackendConfig,

    /// Allowed delegation routes as `source:destination`
    #[serde(default = "default_routes")]
    pub routes: Vec<String>,
}

/// Every downward route of the fixed hierarchy.
pub fn default_routes() -> Vec<String> {
    let mut routes = Vec::with_capacity(PrincessDomain::ALL.len() * 2);
    for domain in PrincessDomain::ALL {
        routes.push(format!("{}:{}", AgentRole::Queen, AgentRole::Princess(domain)));
    }
    for domain in PrincessDomain::ALL {
        routes.push(format!("{}:{}", AgentRole::Princess(domain), AgentRole::Drone));
    }
    routes
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            transport: TransportConfig::default(),
            circuit_breaker: BreakerConfig::default(),
            store: StoreConfig::default(),
            trainer: TrainerConfig::default(),
            backend: BackendConfig::default(),
            routes: default_routes(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rotated log files; stderr only when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<String>,

    /// Rotation: daily, hourly or never
    #[serde(default = "default_rotation")]
    pub rotation: String,

    /// Number of days to retain logs
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

const fn default_retention_days() -> u32 {
    30
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
            retention_days: default_retention_days(),
        }
    }
}

/// Transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TransportConfig {
    /// Timeout applied to tasks created without an explicit one
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,

    /// Ceiling on any single optimized delegation
    #[serde(default = "default_latency_budget_ms")]
    pub latency_budget_ms: u64,

    /// Completions larger than this are rejected as malformed
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,
}

const fn default_timeout_ms() -> u64 {
    30_000
}

const fn default_latency_budget_ms() -> u64 {
    250
}

const fn default_max_response_bytes() -> usize {
    65_536
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: default_timeout_ms(),
            latency_budget_ms: default_latency_budget_ms(),
            max_response_bytes: default_max_response_bytes(),
        }
    }
}

/// Circuit breaker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BreakerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Consecutive failures that open the circuit
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// How long an open circuit rejects calls before probing
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
}

const fn default_true() -> bool {
    true
}

const fn default_failure_threshold() -> u32 {
    5
}

const fn default_cooldown_ms() -> u64 {
    30_000
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_threshold: default_failure_threshold(),
            cooldown_ms: default_cooldown_ms(),
        }
    }
}

/// Which artifact store backs the optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    File,
    Sqlite,
}

/// Artifact store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StoreConfig {
    #[serde(default = "default_store_kind")]
    pub kind: StoreKind,

    /// Root directory for the file store
    #[serde(default = "default_store_path")]
    pub path: String,

    /// Database URL for the sqlite store
    #[serde(default = "default_database_url")]
    pub database_url: String,
}

const fn default_store_kind() -> StoreKind {
    StoreKind::File
}

fn default_store_path() -> String {
    ".hivelink/artifacts".to_string()
}

fn default_database_url() -> String {
    "sqlite:.hivelink/hivelink.db".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: default_store_kind(),
            path: default_store_path(),
            database_url: default_database_url(),
        }
    }
}

/// Trainer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TrainerConfig {
    /// Share of examples held out for validation
    #[serde(default = "default_validation_ratio")]
    pub validation_ratio: f64,

    /// Surviving examples required to publish an artifact
    #[serde(default = "default_min_examples")]
    pub min_examples: usize,

    /// Score at which an example stops being retried in later rounds
    #[serde(default = "default_acceptance_threshold")]
    pub acceptance_threshold: f64,

    /// Backend calls in flight at once
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Optional requests-per-minute quota for the backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests_per_minute: Option<u32>,

    /// Per-call timeout while training
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
}

const fn default_validation_ratio() -> f64 {
    0.2
}

const fn default_min_examples() -> usize {
    3
}

const fn default_acceptance_threshold() -> f64 {
    1.0
}

const fn default_max_concurrency() -> usize {
    4
}

const fn default_call_timeout_ms() -> u64 {
    60_000
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            validation_ratio: default_validation_ratio(),
            min_examples: default_min_examples(),
            acceptance_threshold: default_acceptance_threshold(),
            max_concurrency: default_max_concurrency(),
            requests_per_minute: None,
            call_timeout_ms: default_call_timeout_ms(),
        }
    }
}

/// Which backend answers delegations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    ClaudeCode,
    AnthropicApi,
    Mock,
}

impl BackendKind {
    /// Name accepted by `--backend`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClaudeCode => "claude_code",
            Self::AnthropicApi => "anthropic_api",
            Self::Mock => "mock",
        }
    }
}

/// Backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BackendConfig {
    #[serde(default = "default_backend_kind")]
    pub kind: BackendKind,

    #[serde(default)]
    pub claude_code: ClaudeCodeBackendConfig,

    #[serde(default)]
    pub anthropic_api: AnthropicApiBackendConfig,

    #[serde(default)]
    pub mock: MockBackendConfig,
}

const fn default_backend_kind() -> BackendKind {
    BackendKind::ClaudeCode
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: default_backend_kind(),
            claude_code: ClaudeCodeBackendConfig::default(),
            anthropic_api: AnthropicApiBackendConfig::default(),
            mock: MockBackendConfig::default(),
        }
    }
}

/// Claude Code CLI backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ClaudeCodeBackendConfig {
    /// Path to claude CLI executable
    #[serde(default = "default_claude_path")]
    pub claude_path: String,

    #[serde(default = "default_claude_model")]
    pub model: String,

    /// Working directory for claude execution
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
}

fn default_claude_path() -> String {
    "claude".to_string()
}

fn default_claude_model() -> String {
    "sonnet".to_string()
}

impl Default for ClaudeCodeBackendConfig {
    fn default() -> Self {
        Self {
            claude_path: default_claude_path(),
            model: default_claude_model(),
            working_dir: None,
        }
    }
}

/// Anthropic API backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AnthropicApiBackendConfig {
    /// API key (can also be set via ANTHROPIC_API_KEY env var)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_anthropic_model")]
    pub model: String,

    /// Base URL for API (for testing/proxies)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_anthropic_model() -> String {
    "claude-sonnet-4-5-20250929".to_string()
}

const fn default_max_tokens() -> u32 {
    2048
}

impl Default for AnthropicApiBackendConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_anthropic_model(),
            base_url: None,
            max_tokens: default_max_tokens(),
        }
    }
}

/// Canned backend for local dry runs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MockBackendConfig {
    /// Completion text returned for every prompt
    #[serde(default = "default_mock_response")]
    pub response: String,

    #[serde(default)]
    pub delay_ms: u64,
}

fn default_mock_response() -> String {
    r#"{"reasoning": "mock backend", "output": {"status": "done"}}"#.to_string()
}

impl Default for MockBackendConfig {
    fn default() -> Self {
        Self {
            response: default_mock_response(),
            delay_ms: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_routes_cover_hierarchy() {
        let routes = default_routes();
        assert_eq!(routes.len(), 12);
        assert!(routes.contains(&"queen:princess-dev".to_string()));
        assert!(routes.contains(&"princess-infra:drone".to_string()));
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = r"
backend:
  kind: mock
circuit_breaker:
  failure_threshold: 3
";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.backend.kind, BackendKind::Mock);
        assert_eq!(config.circuit_breaker.failure_threshold, 3);
        assert_eq!(config.circuit_breaker.cooldown_ms, 30_000);
        assert_eq!(config.transport.latency_budget_ms, 250);
        assert_eq!(config.store.kind, StoreKind::File);
        assert_eq!(config.routes.len(), 12);
    }
}
