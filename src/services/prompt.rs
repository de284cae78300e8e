//! Prompt assembly for baseline and optimized delegations.
//!
//! The baseline prompt depends only on the path and the task, so the same
//! task always yields the same prompt. An optimized prompt puts the
//! artifact's instruction and demonstrations in the system block; that
//! block is rendered once per artifact and shared, so per-call work is
//! rendering the task itself.

use std::fmt::Write as _;
use std::sync::Arc;

use crate::domain::errors::ArtifactError;
use crate::domain::models::{CommunicationPath, Demonstration, OptimizerArtifact, Prompt, Task};

/// Trailer telling the backend what shape to answer in.
pub const RESPONSE_FORMAT: &str =
    "Respond with a single JSON object with a \"reasoning\" string and an \"output\" field holding the result.";

/// Instruction used when no artifact applies, and as the starting
/// instruction for training.
pub fn baseline_instruction(path: &CommunicationPath) -> String {
    format!(
        "You are the {} agent. The {} agent has delegated a task to you. \
         Work out the result and report it back.",
        path.destination, path.source
    )
}

/// Render the task fields that follow the instruction.
pub fn render_task(task: &Task) -> String {
    let mut out = String::with_capacity(256 + task.description.len());
    let _ = writeln!(out, "Task type: {}", task.task_type);
    let _ = writeln!(out, "Description: {}", task.description);
    if !task.objective.is_empty() {
        let _ = writeln!(out, "Objective: {}", task.objective);
    }
    let _ = writeln!(out, "Priority: {}", task.priority);
    if !task.payload.is_null() {
        let _ = writeln!(out, "Input: {}", task.payload);
    }
    out.push('\n');
    out.push_str(RESPONSE_FORMAT);
    out
}

fn render_demonstrations(out: &mut String, demonstrations: &[Demonstration]) {
    for (index, demo) in demonstrations.iter().enumerate() {
        let _ = writeln!(out, "\n### Example {}", index + 1);
        let _ = writeln!(out, "Input: {}", demo.input);
        if !demo.reasoning.is_empty() {
            let _ = writeln!(out, "Reasoning: {}", demo.reasoning);
        }
        let _ = writeln!(out, "Output: {}", demo.output);
    }
}

/// Builds baseline prompts.
#[derive(Debug, Default, Clone, Copy)]
pub struct PromptBuilder;

impl PromptBuilder {
    /// Prompt for `task` on `path` without any artifact.
    pub fn baseline(path: &CommunicationPath, task: &Task) -> Prompt {
        Prompt::new(baseline_instruction(path), render_task(task))
    }
}

/// A validated artifact with its system prefix rendered once.
#[derive(Debug)]
pub struct CompiledArtifact {
    artifact: OptimizerArtifact,
    prefix: Arc<str>,
}

impl CompiledArtifact {
    /// Validate `artifact` and render its prefix.
    pub fn compile(artifact: OptimizerArtifact) -> Result<Self, ArtifactError> {
        artifact.validate()?;

        let mut prefix = String::with_capacity(artifact.instruction.len() + artifact.demonstrations.len() * 256);
        prefix.push_str(artifact.instruction.trim_end());
        if !artifact.demonstrations.is_empty() {
            prefix.push_str("\n\nWorked examples:\n");
            render_demonstrations(&mut prefix, &artifact.demonstrations);
        }

        Ok(Self {
            artifact,
            prefix: Arc::from(prefix),
        })
    }

    /// Source artifact.
    pub fn artifact(&self) -> &OptimizerArtifact {
        &self.artifact
    }

    /// Version of the wrapped artifact.
    pub fn version(&self) -> u64 {
        self.artifact.version
    }

    /// Rendered instruction and demonstrations.
    pub fn prefix(&self) -> &Arc<str> {
        &self.prefix
    }

    /// Prompt for `task` with this artifact applied.
    pub fn augment(&self, task: &Task) -> Prompt {
        Prompt {
            system: Arc::clone(&self.prefix),
            user: render_task(task),
        }
    }
}
