//! Claude Code CLI backend.
//!
//! Spawns `claude --print --output-format json` for every completion. The
//! process has a large fixed start-up cost, so this backend is mostly used
//! for offline training; the deadline is enforced here by killing the child.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::domain::errors::BackendError;
use crate::domain::models::{ClaudeCodeBackendConfig, Prompt};
use crate::domain::ports::{BackendClient, Completion, FinishReason};

/// Claude Code CLI backend configuration.
#[derive(Debug, Clone)]
pub struct ClaudeCodeConfig {
    /// Path to claude CLI binary
    pub binary_path: String,
    pub model: String,
    pub working_dir: Option<PathBuf>,
    /// Additional CLI flags
    pub extra_flags: Vec<String>,
}

impl Default for ClaudeCodeConfig {
    fn default() -> Self {
        Self {
            binary_path: "claude".to_string(),
            model: "sonnet".to_string(),
            working_dir: None,
            extra_flags: vec![],
        }
    }
}

impl From<&ClaudeCodeBackendConfig> for ClaudeCodeConfig {
    fn from(config: &ClaudeCodeBackendConfig) -> Self {
        Self {
            binary_path: config.claude_path.clone(),
            model: config.model.clone(),
            working_dir: config.working_dir.as_ref().map(PathBuf::from),
            extra_flags: vec![],
        }
    }
}

/// Final record printed by `--output-format json`.
#[derive(Debug, Deserialize)]
struct CliResult {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    subtype: Option<String>,
    #[serde(default)]
    is_error: bool,
    #[serde(default)]
    result: Option<String>,
}

/// Backend running the local `claude` CLI once per completion.
pub struct ClaudeCodeBackend {
    config: ClaudeCodeConfig,
}

impl ClaudeCodeBackend {
    /// Backend using `config`.
    pub fn new(config: ClaudeCodeConfig) -> Self {
        Self { config }
    }

    /// Build CLI arguments for a prompt.
    fn build_args(&self, prompt: &Prompt) -> Vec<String> {
        let mut args = vec![
            "--print".to_string(),
            "--output-format".to_string(),
            "json".to_string(),
            "--model".to_string(),
            self.config.model.clone(),
        ];

        // System prompt (only add if non-empty)
        if !prompt.system.is_empty() {
            args.push("--system-prompt".to_string());
            args.push(prompt.system.to_string());
        }

        args.extend(self.config.extra_flags.iter().cloned());

        args.push("-p".to_string());
        args.push(prompt.user.clone());
        args
    }

    /// Interpret the CLI's stdout.
    ///
    /// Falls back to treating stdout as plain text when it is not the JSON
    /// result record (older CLI versions, or `--output-format text` flags).
    fn parse_output(stdout: &str) -> Completion {
        let trimmed = stdout.trim();
        let record = trimmed
            .lines()
            .rev()
            .find_map(|line| serde_json::from_str::<CliResult>(line).ok())
            .or_else(|| serde_json::from_str::<CliResult>(trimmed).ok());

        match record.filter(|r| r.kind == "result") {
            Some(record) => {
                let text = record.result.unwrap_or_default();
                let finish_reason = if record.is_error {
                    FinishReason::Error
                } else if record.subtype.as_deref() == Some("error_max_turns") {
                    FinishReason::Length
                } else {
                    FinishReason::Stop
                };
                Completion { text, finish_reason }
            }
            None => Completion::stop(trimmed),
        }
    }
}

#[async_trait]
impl BackendClient for ClaudeCodeBackend {
    fn name(&self) -> &'static str {
        "claude_code"
    }

    async fn complete(&self, prompt: &Prompt, deadline: Duration) -> Result<Completion, BackendError> {
        let mut cmd = Command::new(&self.config.binary_path);
        cmd.args(self.build_args(prompt))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(ref dir) = self.config.working_dir {
            cmd.current_dir(dir);
        }

        let child = cmd.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                BackendError::NotConfigured(format!("{} not found on PATH", self.config.binary_path))
            }
            _ => BackendError::Process(format!("failed to spawn {}: {e}", self.config.binary_path)),
        })?;

        let deadline_ms = u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX);

        // Dropping the wait future on timeout drops the child, which kills it.
        let output = match tokio::time::timeout(deadline, child.wait_with_output()).await {
            Err(_) => {
                tracing::debug!(deadline_ms, "claude process killed at deadline");
                return Err(BackendError::Timeout(deadline_ms));
            }
            Ok(Err(e)) => return Err(BackendError::Process(format!("failed to wait for claude: {e}"))),
            Ok(Ok(output)) => output,
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        if output.status.success() {
            return Ok(Self::parse_output(&stdout));
        }

        let completion = Self::parse_output(&stdout);
        if completion.finish_reason == FinishReason::Error {
            return Ok(completion);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(BackendError::Process(format!(
            "claude exited with {}: {}",
            output.status,
            stderr.lines().next().unwrap_or_default()
        )))
    }

    async fn health_check(&self) -> Result<(), BackendError> {
        let output = tokio::time::timeout(
            Duration::from_secs(10),
            Command::new(&self.config.binary_path)
                .arg("--version")
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| BackendError::Timeout(10_000))?
        .map_err(|e| BackendError::NotConfigured(format!("{}: {e}", self.config.binary_path)))?;

        if output.status.success() {
            Ok(())
        } else {
            Err(BackendError::Unavailable(format!("{} --version failed", self.config.binary_path)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_args() {
        let backend = ClaudeCodeBackend::new(ClaudeCodeConfig::default());
        let args = backend.build_args(&Prompt::new("be terse", "do the thing"));

        assert_eq!(&args[..3], ["--print", "--output-format", "json"]);
        let system = args.iter().position(|a| a == "--system-prompt").unwrap();
        assert_eq!(args[system + 1], "be terse");
        assert_eq!(args[args.len() - 2], "-p");
        assert_eq!(args[args.len() - 1], "do the thing");
    }

    #[test]
    fn test_empty_system_prompt_omitted() {
        let backend = ClaudeCodeBackend::new(ClaudeCodeConfig::default());
        let args = backend.build_args(&Prompt::new("", "x"));
        assert!(!args.contains(&"--system-prompt".to_string()));
    }

    #[test]
    fn test_parse_result_record() {
        let stdout = r#"{"type":"result","subtype":"success","is_error":false,"result":"{\"output\": 1}"}"#;
        let completion = ClaudeCodeBackend::parse_output(stdout);
        assert_eq!(completion.finish_reason, FinishReason::Stop);
        assert_eq!(completion.text, r#"{"output": 1}"#);
    }

    #[test]
    fn test_parse_error_record() {
        let stdout = r#"{"type":"result","subtype":"error_during_execution","is_error":true,"result":"API overloaded"}"#;
        let completion = ClaudeCodeBackend::parse_output(stdout);
        assert_eq!(completion.finish_reason, FinishReason::Error);
    }

    #[test]
    fn test_parse_plain_text() {
        let completion = ClaudeCodeBackend::parse_output("just words\n");
        assert_eq!(completion, Completion::stop("just words"));

        let completion = ClaudeCodeBackend::parse_output(r#"{"output": 3}"#);
        assert_eq!(completion, Completion::stop(r#"{"output": 3}"#));
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let backend = ClaudeCodeBackend::new(ClaudeCodeConfig {
            binary_path: "hivelink-no-such-binary".to_string(),
            ..Default::default()
        });
        let err = backend
            .complete(&Prompt::new("", "x"), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::NotConfigured(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_deadline_kills_process() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("slow-claude");
        std::fs::write(&script, "#!/bin/sh\nsleep 5\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let backend = ClaudeCodeBackend::new(ClaudeCodeConfig {
            binary_path: script.to_string_lossy().into_owned(),
            ..Default::default()
        });

        let started = std::time::Instant::now();
        let err = backend
            .complete(&Prompt::new("", "x"), Duration::from_millis(100))
            .await
            .unwrap_err();
        assert_eq!(err, BackendError::Timeout(100));
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
