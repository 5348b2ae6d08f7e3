// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use echo_types::{ToolCall, ToolKind, ToolResult};
use tokio::io::AsyncReadExt;
use tokio::process::Command;

use crate::policy::ApprovalPolicy;
use crate::tool::{ProgressSink, ToolHandler};

/// Runs a shell command in the workspace directory, merging stdout+stderr
/// and capturing an exit code (§4.4). Long outputs are returned whole —
/// truncation is the renderer's concern, not this handler's.
pub struct CommandHandler {
    pub workdir: std::path::PathBuf,
    pub timeout: Duration,
}

impl CommandHandler {
    pub fn new(workdir: impl Into<std::path::PathBuf>, timeout: Duration) -> Self {
        Self { workdir: workdir.into(), timeout }
    }
}

#[async_trait]
impl ToolHandler for CommandHandler {
    fn default_policy(&self) -> ApprovalPolicy {
        ApprovalPolicy::Ask
    }

    async fn execute(&self, call: &ToolCall, _progress: &dyn ProgressSink) -> anyhow::Result<ToolResult> {
        let command = call
            .command
            .clone()
            .ok_or_else(|| anyhow::anyhow!("missing 'command'"))?;

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&command)
            .current_dir(&self.workdir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let mut stdout = child.stdout.take().expect("piped stdout");
        let mut stderr = child.stderr.take().expect("piped stderr");

        let run = async {
            let mut out = Vec::new();
            let mut err = Vec::new();
            let (_, _, status) = tokio::join!(
                stdout.read_to_end(&mut out),
                stderr.read_to_end(&mut err),
                child.wait(),
            );
            let status = status?;
            out.extend_from_slice(&err);
            anyhow::Ok((out, status))
        };

        match tokio::time::timeout(self.timeout, run).await {
            Ok(Ok((output, status))) => {
                let text = String::from_utf8_lossy(&output).to_string();
                Ok(ToolResult {
                    id: call.id.clone(),
                    kind: ToolKind::Command,
                    status: echo_types::ToolStatus::Completed,
                    output: Some(text),
                    error: None,
                    exit_code: status.code(),
                    command: Some(command),
                    path: None,
                    diff: None,
                    approval_id: None,
                    approval_reason: None,
                })
            }
            Ok(Err(e)) => Ok(ToolResult::err(&call.id, ToolKind::Command, e.to_string())),
            Err(_) => {
                let _ = child.start_kill();
                Ok(ToolResult::err(&call.id, ToolKind::Command, "timeout"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::NoopProgressSink;

    #[tokio::test]
    async fn runs_command_and_captures_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let handler = CommandHandler::new(dir.path(), Duration::from_secs(5));
        let mut call = ToolCall::new("1", ToolKind::Command);
        call.command = Some("echo ok".into());
        let result = handler.execute(&call, &NoopProgressSink).await.unwrap();
        assert_eq!(result.exit_code, Some(0));
        assert_eq!(result.output.as_deref(), Some("ok\n"));
    }

    #[tokio::test]
    async fn nonzero_exit_is_not_an_error_status() {
        let dir = tempfile::tempdir().unwrap();
        let handler = CommandHandler::new(dir.path(), Duration::from_secs(5));
        let mut call = ToolCall::new("1", ToolKind::Command);
        call.command = Some("exit 7".into());
        let result = handler.execute(&call, &NoopProgressSink).await.unwrap();
        assert_eq!(result.exit_code, Some(7));
        assert_eq!(result.status, echo_types::ToolStatus::Completed);
    }

    #[tokio::test]
    async fn missing_command_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let handler = CommandHandler::new(dir.path(), Duration::from_secs(5));
        let call = ToolCall::new("1", ToolKind::Command);
        let result = handler.execute(&call, &NoopProgressSink).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn timeout_is_reported_as_error_result() {
        let dir = tempfile::tempdir().unwrap();
        let handler = CommandHandler::new(dir.path(), Duration::from_millis(50));
        let mut call = ToolCall::new("1", ToolKind::Command);
        call.command = Some("sleep 5".into());
        let result = handler.execute(&call, &NoopProgressSink).await.unwrap();
        assert_eq!(result.status, echo_types::ToolStatus::Error);
        assert_eq!(result.error.as_deref(), Some("timeout"));
    }
}
