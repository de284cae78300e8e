//! Role-bearing agents that hand tasks down the hierarchy.

use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::optimizer_middleware::OptimizationMiddleware;
use crate::domain::errors::DelegationError;
use crate::domain::models::{AgentIdentity, AgentRole, CommunicationPath, QualityReport, Task, TaskResult};
use crate::domain::ports::QualityAnalyzer;

/// Reasons a task plan is rejected before anything is sent.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("Task {task} depends on {dependency}, which is not part of the plan")]
    UnknownDependency { task: Uuid, dependency: Uuid },

    #[error("Circular dependency between tasks: {0:?}")]
    Cycle(Vec<Uuid>),

    #[error("Task {0} appears more than once in the plan")]
    DuplicateTask(Uuid),
}

/// A role-bearing agent that hands tasks down the hierarchy.
pub struct DelegatingAgent {
    identity: AgentIdentity,
    middleware: Arc<OptimizationMiddleware>,
    analyzer: Option<Arc<dyn QualityAnalyzer>>,
}

impl DelegatingAgent {
    /// Agent acting as `identity`, delegating through `middleware`.
    pub fn new(identity: AgentIdentity, middleware: Arc<OptimizationMiddleware>) -> Self {
        Self {
            identity,
            middleware,
            analyzer: None,
        }
    }

    /// Attach the analyzer used by [`DelegatingAgent::request_quality_report`].
    pub fn with_quality_analyzer(mut self, analyzer: Arc<dyn QualityAnalyzer>) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    /// This agent's identity.
    pub fn identity(&self) -> &AgentIdentity {
        &self.identity
    }

    /// This agent's role.
    pub fn role(&self) -> AgentRole {
        self.identity.role()
    }

    /// Send `task` to `destination` through the optimization middleware.
    pub async fn delegate(&self, destination: AgentRole, task: &Task) -> Result<TaskResult, DelegationError> {
        self.middleware.optimize_and_send(self.role(), destination, task).await
    }

    /// Try each candidate in order until one answers.
    ///
    /// Moves on after `CircuitOpen`, `Timeout` and `DestinationUnreachable`.
    /// A malformed response is returned at once. An empty candidate list
    /// means every destination routed from this agent's role.
    pub async fn delegate_with_failover(
        &self,
        candidates: &[AgentRole],
        task: &Task,
    ) -> Result<TaskResult, DelegationError> {
        let candidates = if candidates.is_empty() {
            self.middleware.transport().routes().destinations_from(self.role())
        } else {
            candidates.to_vec()
        };

        let mut last_error = None;
        for destination in candidates {
            match self.delegate(destination, task).await {
                Ok(result) => return Ok(result),
                Err(err) if err.is_failover_candidate() => {
                    debug!(agent = %self.identity, %destination, kind = err.kind(), "failing over");
                    last_error = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_error.unwrap_or_else(|| DelegationError::DestinationUnreachable {
            path: CommunicationPath::new(self.role(), self.role()),
            reason: "no destinations available".to_string(),
        }))
    }

    /// Run a set of interdependent tasks against `destination`.
    ///
    /// Tasks run in waves: every task whose dependencies have all succeeded
    /// is sent concurrently. Dependents of a failed task are reported as
    /// failed without being sent. Results come back in input order.
    pub async fn delegate_plan(&self, destination: AgentRole, tasks: &[Task]) -> Result<Vec<TaskResult>, PlanError> {
        let waves = plan_waves(tasks)?;
        let mut results: HashMap<Uuid, TaskResult> = HashMap::with_capacity(tasks.len());
        let mut failed: HashSet<Uuid> = HashSet::new();

        for (number, wave) in waves.iter().enumerate() {
            let (blocked, ready): (Vec<&Task>, Vec<&Task>) = wave
                .iter()
                .map(|&i| &tasks[i])
                .partition(|task| task.dependencies.iter().any(|d| failed.contains(d)));

            for task in blocked {
                warn!(agent = %self.identity, task_id = %task.id, "skipping task, a dependency failed");
                failed.insert(task.id);
                results.insert(task.id, TaskResult::failure(task.id, "dependency failed", 0));
            }

            debug!(agent = %self.identity, wave = number + 1, tasks = ready.len(), "sending wave");
            let outcomes = join_all(ready.iter().map(|task| self.delegate(destination, task))).await;

            for (task, outcome) in ready.into_iter().zip(outcomes) {
                let result = match outcome {
                    Ok(result) => result,
                    Err(err) => self.report(task, &err),
                };
                if !result.success {
                    failed.insert(task.id);
                }
                results.insert(task.id, result);
            }
        }

        info!(
            agent = %self.identity,
            tasks = tasks.len(),
            failed = failed.len(),
            "plan finished"
        );
        Ok(tasks.iter().filter_map(|task| results.remove(&task.id)).collect())
    }

    /// Turn a delegation failure into a failed result for the agent above.
    pub fn report(&self, task: &Task, err: &DelegationError) -> TaskResult {
        TaskResult::failure(task.id, format!("{}: {err}", err.kind()), 0)
    }

    /// Ask the static analyzer about `target`.
    pub async fn request_quality_report(&self, target: &str) -> anyhow::Result<QualityReport> {
        let analyzer = self
            .analyzer
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("no quality analyzer configured for {}", self.identity))?;
        analyzer.analyze(target).await
    }
}

/// Group task indices into dependency-ordered waves, each in input order.
fn plan_waves(tasks: &[Task]) -> Result<Vec<Vec<usize>>, PlanError> {
    let mut index: HashMap<Uuid, usize> = HashMap::with_capacity(tasks.len());
    for (i, task) in tasks.iter().enumerate() {
        if index.insert(task.id, i).is_some() {
            return Err(PlanError::DuplicateTask(task.id));
        }
    }

    let mut in_degree = vec![0usize; tasks.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); tasks.len()];
    for (i, task) in tasks.iter().enumerate() {
        for dependency in &task.dependencies {
            let &d = index.get(dependency).ok_or(PlanError::UnknownDependency {
                task: task.id,
                dependency: *dependency,
            })?;
            in_degree[i] += 1;
            dependents[d].push(i);
        }
    }

    let mut waves = Vec::new();
    let mut current: Vec<usize> = (0..tasks.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut placed = 0;

    while !current.is_empty() {
        placed += current.len();
        let mut next = Vec::new();
        for &i in &current {
            for &dependent in &dependents[i] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    next.push(dependent);
                }
            }
        }
        next.sort_unstable();
        waves.push(std::mem::replace(&mut current, next));
    }

    if placed != tasks.len() {
        let cycle = (0..tasks.len()).filter(|&i| in_degree[i] > 0).map(|i| tasks[i].id).collect();
        return Err(PlanError::Cycle(cycle));
    }
    Ok(waves)
}
