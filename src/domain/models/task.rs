//! Tasks handed between agents and the results they produce.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::domain::errors::TaskError;

/// Default per-task timeout (30 seconds).
pub const DEFAULT_TASK_TIMEOUT_MS: u64 = 30_000;

/// Default priority on the 0-10 scale.
pub const DEFAULT_PRIORITY: u8 = 5;

/// A unit of delegated work. Immutable once sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Globally unique identifier, used to correlate the result.
    pub id: Uuid,
    /// Task subtype, e.g. `implement`, `review`, `decompose`.
    #[serde(rename = "type")]
    pub task_type: String,
    pub description: String,
    #[serde(default)]
    pub objective: String,
    #[serde(default)]
    pub payload: serde_json::Value,
    /// 0-10, higher = more urgent.
    #[serde(default = "default_priority")]
    pub priority: u8,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub dependencies: Vec<Uuid>,
}

const fn default_priority() -> u8 {
    DEFAULT_PRIORITY
}

const fn default_timeout_ms() -> u64 {
    DEFAULT_TASK_TIMEOUT_MS
}

impl Task {
    /// Create a new task with a fresh id and default priority and timeout.
    pub fn new(task_type: impl Into<String>, description: impl Into<String>) -> Result<Self, TaskError> {
        let description = description.into();
        if description.trim().is_empty() {
            return Err(TaskError::EmptyDescription);
        }

        Ok(Self {
            id: Uuid::new_v4(),
            task_type: task_type.into(),
            description,
            objective: String::new(),
            payload: serde_json::Value::Null,
            priority: DEFAULT_PRIORITY,
            timeout_ms: DEFAULT_TASK_TIMEOUT_MS,
            dependencies: Vec::new(),
        })
    }

    /// Set the objective the result is judged against.
    pub fn with_objective(mut self, objective: impl Into<String>) -> Self {
        self.objective = objective.into();
        self
    }

    /// Attach structured input.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// Set priority, 0 to 10.
    pub fn with_priority(mut self, priority: u8) -> Result<Self, TaskError> {
        if priority > 10 {
            return Err(TaskError::InvalidPriority(priority));
        }
        self.priority = priority;
        Ok(self)
    }

    /// Set a non-zero timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, TaskError> {
        if timeout.is_zero() {
            return Err(TaskError::ZeroTimeout);
        }
        self.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        Ok(self)
    }

    /// Set the tasks this one waits on. A task cannot depend on itself.
    pub fn with_dependencies(mut self, dependencies: Vec<Uuid>) -> Result<Self, TaskError> {
        if dependencies.contains(&self.id) {
            return Err(TaskError::SelfDependency);
        }
        self.dependencies = dependencies;
        Ok(self)
    }

    /// Per-task timeout as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Outcome of a delegated task, correlated by `task_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: Uuid,
    pub success: bool,
    #[serde(default)]
    pub output: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub latency_ms: u64,
    /// Whether an optimizer artifact shaped the prompt.
    #[serde(default)]
    pub optimized: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_version: Option<u64>,
}

impl TaskResult {
    /// Successful result carrying `output`.
    pub fn success(task_id: Uuid, output: serde_json::Value, latency_ms: u64) -> Self {
        Self {
            task_id,
            success: true,
            output,
            error: None,
            latency_ms,
            optimized: false,
            artifact_version: None,
        }
    }

    /// Failed result carrying `error`.
    pub fn failure(task_id: Uuid, error: impl Into<String>, latency_ms: u64) -> Self {
        Self {
            task_id,
            success: false,
            output: serde_json::Value::Null,
            error: Some(error.into()),
            latency_ms,
            optimized: false,
            artifact_version: None,
        }
    }

    /// Mark the result as shaped by artifact `artifact_version`, if any.
    pub fn with_optimization(mut self, artifact_version: Option<u64>) -> Self {
        self.optimized = artifact_version.is_some();
        self.artifact_version = artifact_version;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_builder() {
        let dep = Uuid::new_v4();
        let task = Task::new("implement", "Add retry to the uploader")
            .unwrap()
            .with_objective("uploader survives transient errors")
            .with_payload(serde_json::json!({"files": ["src/upload.rs"]}))
            .with_priority(8)
            .unwrap()
            .with_timeout(Duration::from_millis(1500))
            .unwrap()
            .with_dependencies(vec![dep])
            .unwrap();

        assert_eq!(task.priority, 8);
        assert_eq!(task.timeout(), Duration::from_millis(1500));
        assert_eq!(task.dependencies, vec![dep]);
    }

    #[test]
    fn test_task_validation() {
        assert_eq!(Task::new("x", "   "), Err(TaskError::EmptyDescription));

        let task = Task::new("x", "y").unwrap();
        assert_eq!(task.clone().with_priority(11), Err(TaskError::InvalidPriority(11)));
        assert_eq!(task.clone().with_timeout(Duration::ZERO), Err(TaskError::ZeroTimeout));

        let own_id = task.id;
        assert_eq!(task.with_dependencies(vec![own_id]), Err(TaskError::SelfDependency));
    }

    #[test]
    fn test_task_serializes_type_field() {
        let task = Task::new("review", "Review the diff").unwrap();
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["type"], "review");
        assert_eq!(json["timeout_ms"], DEFAULT_TASK_TIMEOUT_MS);

        let back: Task = serde_json::from_value(json).unwrap();
        assert_eq!(back, task);
    }

    #[test]
    fn test_result_constructors() {
        let id = Uuid::new_v4();
        let ok = TaskResult::success(id, serde_json::json!({"done": true}), 12).with_optimization(Some(3));
        assert!(ok.success);
        assert!(ok.optimized);
        assert_eq!(ok.artifact_version, Some(3));

        let failed = TaskResult::failure(id, "boom", 40);
        assert!(!failed.success);
        assert_eq!(failed.error.as_deref(), Some("boom"));
        assert!(!failed.optimized);
    }
}
