// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use echo_types::{ToolCall, ToolKind, ToolResult};

use crate::policy::ApprovalPolicy;
use crate::tool::{ProgressSink, ToolHandler};

/// Returns file contents as `output` with `path` echoed (§4.4).
pub struct FileReadHandler {
    pub workdir: std::path::PathBuf,
}

impl FileReadHandler {
    pub fn new(workdir: impl Into<std::path::PathBuf>) -> Self {
        Self { workdir: workdir.into() }
    }

    fn resolve(&self, path: &str) -> std::path::PathBuf {
        let p = std::path::Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.workdir.join(p)
        }
    }
}

#[async_trait]
impl ToolHandler for FileReadHandler {
    fn default_policy(&self) -> ApprovalPolicy {
        ApprovalPolicy::Auto
    }

    async fn execute(&self, call: &ToolCall, _progress: &dyn ProgressSink) -> anyhow::Result<ToolResult> {
        let path = call.path.clone().ok_or_else(|| anyhow::anyhow!("missing 'path'"))?;
        let full = self.resolve(&path);
        match tokio::fs::read_to_string(&full).await {
            Ok(content) => Ok(ToolResult {
                id: call.id.clone(),
                kind: ToolKind::FileRead,
                status: echo_types::ToolStatus::Completed,
                output: Some(content),
                error: None,
                exit_code: None,
                command: None,
                path: Some(path),
                diff: None,
                approval_id: None,
                approval_reason: None,
            }),
            Err(e) => Ok(ToolResult::err(&call.id, ToolKind::FileRead, format!("{path}: {e}"))),
        }
    }
}
