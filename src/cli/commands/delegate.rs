//! `hivelink delegate`: send one task down a configured route.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::adapters::events::TracingEventSink;
use crate::adapters::store::open_store;
use crate::cli::backend_for;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{AgentIdentity, AgentRole, Config, Task, TaskResult};
use crate::domain::ports::BackendClient;
use crate::services::{
    ArtifactCache, CircuitBreakerConfig, CircuitBreakerService, DelegatingAgent, OptimizationMiddleware,
    ResponseParser, RoutingTable, TransportProtocol,
};

/// Arguments for `hivelink delegate`.
#[derive(Args, Debug)]
pub struct DelegateArgs {
    /// What the destination should do
    pub description: String,

    /// Destination role; repeat for failover order (e.g. princess-dev)
    #[arg(long = "to", required = true)]
    pub destinations: Vec<AgentRole>,

    /// Delegating role
    #[arg(long, default_value = "queen")]
    pub from: AgentRole,

    /// Task subtype
    #[arg(long = "type", default_value = "implement")]
    pub task_type: String,

    /// Expected outcome
    #[arg(long)]
    pub objective: Option<String>,

    /// JSON payload attached to the task
    #[arg(long)]
    pub payload: Option<String>,

    /// Priority 0-10
    #[arg(long, default_value_t = crate::domain::models::DEFAULT_PRIORITY)]
    pub priority: u8,

    /// Task timeout in milliseconds (defaults to transport.default_timeout_ms)
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Artifact directory; overrides the configured store
    #[arg(long)]
    pub store: Option<PathBuf>,

    /// Backend for every route (claude_code, anthropic_api, mock)
    #[arg(long)]
    pub backend: Option<String>,
}

/// Result of a one-off delegation.
#[derive(Debug, serde::Serialize)]
#[serde(transparent)]
pub struct DelegateOutput {
    pub result: TaskResult,
}

impl CommandOutput for DelegateOutput {
    fn to_human(&self) -> String {
        let r = &self.result;
        let mode = match r.artifact_version {
            Some(v) => format!("optimized (artifact v{v})"),
            None => "baseline".to_string(),
        };
        let mut lines = vec![
            format!("Task {}: {}", r.task_id, if r.success { "succeeded" } else { "failed" }),
            format!("  Prompt: {mode}"),
            format!("  Latency: {}ms", r.latency_ms),
        ];
        if let Some(error) = &r.error {
            lines.push(format!("  Error: {error}"));
        }
        if !r.output.is_null() {
            let rendered = serde_json::to_string_pretty(&r.output).unwrap_or_else(|_| r.output.to_string());
            lines.push(format!("  Output:\n{rendered}"));
        }
        lines.join("\n")
    }
}

/// Wire routing, breakers, transport and the artifact cache from configuration.
pub async fn build_middleware(
    config: &Config,
    backend: Arc<dyn BackendClient>,
    store_override: Option<&std::path::Path>,
) -> Result<OptimizationMiddleware> {
    let routes = RoutingTable::from_specs(config.routes.as_slice(), backend).context("Invalid routing table")?;
    let breakers = CircuitBreakerService::new(CircuitBreakerConfig::from(&config.circuit_breaker));
    let transport = TransportProtocol::new(
        routes,
        Arc::new(breakers),
        Arc::new(TracingEventSink::new()),
        ResponseParser::new(config.transport.max_response_bytes),
    );
    let store = open_store(&config.store, store_override)
        .await
        .context("Failed to open artifact store")?;

    Ok(OptimizationMiddleware::new(Arc::new(transport), Arc::new(ArtifactCache::new(store)))
        .with_transport_config(&config.transport))
}

/// Send one task through the middleware and print the result.
pub async fn execute(args: DelegateArgs, config: &Config, json_mode: bool) -> Result<()> {
    let payload = match &args.payload {
        Some(raw) => serde_json::from_str(raw).context("--payload is not valid JSON")?,
        None => serde_json::Value::Null,
    };
    let timeout = Duration::from_millis(args.timeout_ms.unwrap_or(config.transport.default_timeout_ms));

    let mut task = Task::new(args.task_type, args.description)?
        .with_payload(payload)
        .with_priority(args.priority)?
        .with_timeout(timeout)?;
    if let Some(objective) = args.objective {
        task = task.with_objective(objective);
    }

    let backend = backend_for(config, args.backend.as_deref())?;
    let middleware = build_middleware(config, backend, args.store.as_deref()).await?;
    let agent = DelegatingAgent::new(AgentIdentity::new(args.from), Arc::new(middleware));

    let result = agent
        .delegate_with_failover(&args.destinations, &task)
        .await
        .with_context(|| format!("Delegation of task {} failed", task.id))?;

    let success = result.success;
    output(&DelegateOutput { result }, json_mode);
    if !success {
        anyhow::bail!("Destination reported failure for task {}", task.id);
    }
    Ok(())
}
