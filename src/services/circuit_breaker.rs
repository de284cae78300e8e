//! Circuit breaker pattern for failure isolation between agents.
//!
//! One breaker per communication path. A destination that keeps failing is
//! excluded for a cooldown period so callers fail fast instead of stacking up
//! timeouts, then a single probe decides whether traffic resumes.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::models::{BreakerConfig, CommunicationPath};

/// Configuration for circuit breakers.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening the circuit.
    pub failure_threshold: u32,
    /// How long the circuit stays open before a probe is allowed.
    pub cooldown: Duration,
    /// Whether to enable circuit breakers.
    pub enabled: bool,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::seconds(30),
            enabled: true,
        }
    }
}

impl From<&BreakerConfig> for CircuitBreakerConfig {
    fn from(config: &BreakerConfig) -> Self {
        Self {
            failure_threshold: config.failure_threshold.max(1),
            cooldown: Duration::milliseconds(i64::try_from(config.cooldown_ms).unwrap_or(i64::MAX)),
            enabled: config.enabled,
        }
    }
}

/// State of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Circuit is closed, requests flow normally.
    Closed,
    /// Circuit is open, requests are blocked.
    Open,
    /// Circuit is letting a single probe through.
    HalfOpen,
}

impl CircuitState {
    /// Lowercase state name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

/// Breaker state for one path.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    pub path: CommunicationPath,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    /// When the circuit last opened.
    pub opened_at: Option<DateTime<Utc>>,
    /// When the in-flight probe was let through, while half-open.
    pub probe_started_at: Option<DateTime<Utc>>,
    /// When state last changed.
    pub state_changed_at: DateTime<Utc>,
    /// Total times circuit opened.
    pub open_count: u32,
    pub last_error: Option<String>,
}

impl CircuitBreaker {
    /// Create a new, closed circuit breaker.
    pub fn new(path: CommunicationPath) -> Self {
        Self {
            path,
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            probe_started_at: None,
            state_changed_at: Utc::now(),
            open_count: 0,
            last_error: None,
        }
    }

    /// Decide whether an attempt may proceed at `now`.
    ///
    /// Moves OPEN to HALF_OPEN once the cooldown has elapsed and hands out
    /// the single probe slot. A probe that never reports back gives up its
    /// slot after one more cooldown.
    pub fn check_at(&mut self, now: DateTime<Utc>, config: &CircuitBreakerConfig) -> CircuitCheckResult {
        match self.state {
            CircuitState::Closed => CircuitCheckResult::Allowed,
            CircuitState::Open => {
                let opened_at = self.opened_at.unwrap_or(now);
                let retry_after = opened_at + config.cooldown;
                if now >= retry_after {
                    self.half_open(now);
                    CircuitCheckResult::Testing { path: self.path }
                } else {
                    CircuitCheckResult::Blocked {
                        path: self.path,
                        opened_at,
                        retry_after,
                    }
                }
            }
            CircuitState::HalfOpen => {
                let lease_expires = self.probe_started_at.map(|started| started + config.cooldown);
                match lease_expires {
                    Some(expires) if now < expires => CircuitCheckResult::Blocked {
                        path: self.path,
                        opened_at: self.opened_at.unwrap_or(now),
                        retry_after: expires,
                    },
                    _ => {
                        self.probe_started_at = Some(now);
                        CircuitCheckResult::Testing { path: self.path }
                    }
                }
            }
        }
    }

    /// Record a failed attempt. Returns `true` when this failure opened the circuit.
    pub fn record_failure_at(
        &mut self,
        now: DateTime<Utc>,
        error: impl Into<String>,
        config: &CircuitBreakerConfig,
    ) -> bool {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_error = Some(error.into());

        match self.state {
            CircuitState::Closed if self.consecutive_failures >= config.failure_threshold => {
                self.open(now);
                true
            }
            // A failed probe reopens immediately.
            CircuitState::HalfOpen => {
                self.open(now);
                true
            }
            _ => false,
        }
    }

    /// Record a successful attempt.
    pub fn record_success_at(&mut self, now: DateTime<Utc>) {
        self.consecutive_failures = 0;
        if self.state == CircuitState::HalfOpen {
            self.close(now);
        }
    }

    fn open(&mut self, now: DateTime<Utc>) {
        self.state = CircuitState::Open;
        self.opened_at = Some(now);
        self.probe_started_at = None;
        self.state_changed_at = now;
        self.open_count += 1;
    }

    fn close(&mut self, now: DateTime<Utc>) {
        self.state = CircuitState::Closed;
        self.opened_at = None;
        self.probe_started_at = None;
        self.state_changed_at = now;
        self.consecutive_failures = 0;
    }

    fn half_open(&mut self, now: DateTime<Utc>) {
        self.state = CircuitState::HalfOpen;
        self.probe_started_at = Some(now);
        self.state_changed_at = now;
    }

    /// Manually reset the circuit.
    pub fn reset(&mut self) {
        self.close(Utc::now());
        self.open_count = 0;
        self.last_error = None;
    }
}

/// Result of a circuit breaker check.
#[derive(Debug, Clone, PartialEq)]
pub enum CircuitCheckResult {
    /// Request is allowed.
    Allowed,
    /// Request is blocked by open circuit.
    Blocked {
        path: CommunicationPath,
        opened_at: DateTime<Utc>,
        retry_after: DateTime<Utc>,
    },
    /// This request is the half-open probe.
    Testing { path: CommunicationPath },
}

impl CircuitCheckResult {
    /// Whether the attempt may go ahead, as a normal call or as the probe.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed | Self::Testing { .. })
    }

    /// Whether the attempt must be refused.
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked { .. })
    }
}

/// Event emitted when a circuit breaker trips.
#[derive(Debug, Clone)]
pub struct CircuitTrippedEvent {
    pub path: CommunicationPath,
    pub tripped_at: DateTime<Utc>,
    /// How many times this circuit has opened.
    pub open_count: u32,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
}

/// Statistics for a circuit breaker.
#[derive(Debug, Clone, Serialize)]
pub struct CircuitStats {
    pub path: String,
    pub state: String,
    pub consecutive_failures: u32,
    pub open_count: u32,
    pub opened_at: Option<DateTime<Utc>>,
    pub state_changed_at: DateTime<Utc>,
}

/// Service for managing per-path circuit breakers.
///
/// Only the transport should call the mutating methods.
pub struct CircuitBreakerService {
    config: CircuitBreakerConfig,
    circuits: Arc<RwLock<HashMap<CommunicationPath, CircuitBreaker>>>,
    event_sender: Option<tokio::sync::mpsc::Sender<CircuitTrippedEvent>>,
}

impl CircuitBreakerService {
    /// Create a new circuit breaker service.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            circuits: Arc::new(RwLock::new(HashMap::new())),
            event_sender: None,
        }
    }

    /// Create with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }

    /// Set the event sender for circuit tripped events.
    pub fn with_event_sender(mut self, sender: tokio::sync::mpsc::Sender<CircuitTrippedEvent>) -> Self {
        self.event_sender = Some(sender);
        self
    }

    /// Check if a request is allowed on `path`.
    pub async fn check(&self, path: CommunicationPath) -> CircuitCheckResult {
        if !self.config.enabled {
            return CircuitCheckResult::Allowed;
        }

        let mut circuits = self.circuits.write().await;
        let circuit = circuits.entry(path).or_insert_with(|| CircuitBreaker::new(path));
        let previous = circuit.state;
        let result = circuit.check_at(Utc::now(), &self.config);

        if previous == CircuitState::Open && circuit.state == CircuitState::HalfOpen {
            tracing::info!(path = %path, "circuit half-open, sending probe");
        }
        result
    }

    /// Record a failure on `path`.
    pub async fn record_failure(&self, path: CommunicationPath, error: impl Into<String>) {
        if !self.config.enabled {
            return;
        }

        let mut circuits = self.circuits.write().await;
        let circuit = circuits.entry(path).or_insert_with(|| CircuitBreaker::new(path));

        if circuit.record_failure_at(Utc::now(), error, &self.config) {
            tracing::warn!(
                path = %path,
                open_count = circuit.open_count,
                consecutive_failures = circuit.consecutive_failures,
                "circuit opened"
            );

            if let Some(ref sender) = self.event_sender {
                let event = CircuitTrippedEvent {
                    path,
                    tripped_at: circuit.opened_at.unwrap_or_else(Utc::now),
                    open_count: circuit.open_count,
                    consecutive_failures: circuit.consecutive_failures,
                    last_error: circuit.last_error.clone(),
                };

                let _ = sender.try_send(event);
            }
        }
    }

    /// Record a success on `path`.
    pub async fn record_success(&self, path: CommunicationPath) {
        if !self.config.enabled {
            return;
        }

        let mut circuits = self.circuits.write().await;
        let circuit = circuits.entry(path).or_insert_with(|| CircuitBreaker::new(path));
        let was_half_open = circuit.state == CircuitState::HalfOpen;
        circuit.record_success_at(Utc::now());
        if was_half_open {
            tracing::info!(path = %path, "probe succeeded, circuit closed");
        }
    }

    /// Get the state of a circuit. Paths never seen are closed.
    pub async fn get_state(&self, path: &CommunicationPath) -> CircuitState {
        let circuits = self.circuits.read().await;
        circuits.get(path).map_or(CircuitState::Closed, |c| c.state)
    }

    /// Get statistics for all circuits, ordered by path.
    pub async fn stats(&self) -> Vec<CircuitStats> {
        let circuits = self.circuits.read().await;
        let mut breakers: Vec<&CircuitBreaker> = circuits.values().collect();
        breakers.sort_by_key(|c| c.path);
        breakers
            .into_iter()
            .map(|c| CircuitStats {
                path: c.path.to_string(),
                state: c.state.as_str().to_string(),
                consecutive_failures: c.consecutive_failures,
                open_count: c.open_count,
                opened_at: c.opened_at,
                state_changed_at: c.state_changed_at,
            })
            .collect()
    }

    /// Get open circuits.
    pub async fn open_circuits(&self) -> Vec<CommunicationPath> {
        let circuits = self.circuits.read().await;
        let mut open: Vec<_> = circuits
            .iter()
            .filter(|(_, c)| c.state == CircuitState::Open)
            .map(|(p, _)| *p)
            .collect();
        open.sort();
        open
    }

    /// Manually reset a circuit.
    pub async fn reset(&self, path: &CommunicationPath) {
        let mut circuits = self.circuits.write().await;
        if let Some(circuit) = circuits.get_mut(path) {
            circuit.reset();
        }
    }

    /// Reset all circuits.
    pub async fn reset_all(&self) {
        let mut circuits = self.circuits.write().await;
        for circuit in circuits.values_mut() {
            circuit.reset();
        }
    }

    /// Get configuration.
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }
}

/// Execute a future with circuit breaker protection.
///
/// A blocked circuit returns without polling `f`. Otherwise the outcome of
/// `f` is charged to `path`.
pub async fn with_circuit_breaker<F, T, E>(
    service: &CircuitBreakerService,
    path: CommunicationPath,
    f: F,
) -> Result<T, CircuitBreakerError<E>>
where
    F: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    match service.check(path).await {
        CircuitCheckResult::Blocked {
            path,
            opened_at,
            retry_after,
        } => Err(CircuitBreakerError::CircuitOpen {
            path,
            opened_at,
            retry_after,
        }),
        CircuitCheckResult::Allowed | CircuitCheckResult::Testing { .. } => match f.await {
            Ok(result) => {
                service.record_success(path).await;
                Ok(result)
            }
            Err(e) => {
                service.record_failure(path, e.to_string()).await;
                Err(CircuitBreakerError::OperationFailed(e))
            }
        },
    }
}

/// Error from circuit breaker protected operation.
#[derive(Debug)]
pub enum CircuitBreakerError<E> {
    /// The circuit is open and blocking requests.
    CircuitOpen {
        path: CommunicationPath,
        opened_at: DateTime<Utc>,
        retry_after: DateTime<Utc>,
    },
    /// The underlying operation failed.
    OperationFailed(E),
}

impl<E: std::fmt::Display> std::fmt::Display for CircuitBreakerError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CircuitOpen { path, retry_after, .. } => {
                write!(f, "Circuit breaker open for {path}, retry after {retry_after}")
            }
            Self::OperationFailed(e) => write!(f, "Operation failed: {e}"),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for CircuitBreakerError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::CircuitOpen { .. } => None,
            Self::OperationFailed(e) => Some(e),
        }
    }
}
