// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use echo_types::{ToolCall, ToolResult};

use crate::policy::ApprovalPolicy;

/// One intermediate progress update a handler may report while running.
/// Forwarded by the dispatcher as `item.updated` (§4.4).
#[derive(Debug, Clone)]
pub struct ToolProgress {
    pub output: String,
}

/// Channel a handler uses to report intermediate progress back to the
/// dispatcher. A no-op sink is fine for handlers with nothing to report.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn report(&self, progress: ToolProgress);
}

pub struct NoopProgressSink;

#[async_trait]
impl ProgressSink for NoopProgressSink {
    async fn report(&self, _progress: ToolProgress) {}
}

/// Trait every built-in tool handler implements (§4.4). Handlers are
/// stateless with respect to one another: concurrent calls with different
/// ids may run in parallel.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Run the call to completion, or fail. Errors returned here become a
    /// non-fatal `ToolResult{status: error}` at the dispatcher boundary
    /// (§4.4, §7 item 4) — they never propagate as a turn-ending error.
    async fn execute(&self, call: &ToolCall, progress: &dyn ProgressSink) -> anyhow::Result<ToolResult>;

    /// Default approval policy for this handler's calls.
    fn default_policy(&self) -> ApprovalPolicy {
        ApprovalPolicy::Auto
    }
}
