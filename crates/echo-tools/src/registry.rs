// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::sync::Arc;

use echo_types::{ToolCall, ToolKind, ToolResult, ToolStatus};

use crate::tool::{NoopProgressSink, ProgressSink, ToolHandler};

/// Maps a [`ToolKind`] to its handler (§4.4: "The Runtime holds a mapping
/// `ToolKind → Handler`"). One registry instance is shared by a whole
/// process; handlers are immutable after registration.
pub struct ToolRegistry {
    handlers: HashMap<ToolKind, Arc<dyn ToolHandler>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { handlers: HashMap::new() }
    }

    pub fn register(&mut self, kind: ToolKind, handler: impl ToolHandler + 'static) {
        self.handlers.insert(kind, Arc::new(handler));
    }

    pub fn get(&self, kind: ToolKind) -> Option<Arc<dyn ToolHandler>> {
        self.handlers.get(&kind).cloned()
    }

    /// Runs a call through its handler with a no-op progress sink, wrapping
    /// a handler error as `ToolResult{status: error}` rather than letting it
    /// escape (§4.4, §7 item 4: tool errors are never fatal to the turn).
    pub async fn execute(&self, call: &ToolCall) -> ToolResult {
        self.execute_with_progress(call, &NoopProgressSink).await
    }

    pub async fn execute_with_progress(&self, call: &ToolCall, progress: &dyn ProgressSink) -> ToolResult {
        match self.handlers.get(&call.kind) {
            Some(handler) => match handler.execute(call, progress).await {
                Ok(result) => result,
                Err(e) => ToolResult {
                    id: call.id.clone(),
                    kind: call.kind,
                    status: ToolStatus::Error,
                    output: None,
                    error: Some(e.to_string()),
                    exit_code: None,
                    command: call.command.clone(),
                    path: call.path.clone(),
                    diff: None,
                    approval_id: None,
                    approval_reason: None,
                },
            },
            None => ToolResult {
                id: call.id.clone(),
                kind: call.kind,
                status: ToolStatus::Error,
                output: None,
                error: Some(format!("no handler registered for {:?}", call.kind)),
                exit_code: None,
                command: None,
                path: None,
                diff: None,
                approval_id: None,
                approval_reason: None,
            },
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
