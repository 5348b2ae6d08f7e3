// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Tool trait, registry, approval policy and the five built-in tool handlers
//! that back `command`, `apply_patch`, `file_read`, `search`, `update_plan`.

pub mod builtin;
mod policy;
mod registry;
mod tool;

pub use policy::{ApprovalPolicy, ToolPolicy};
pub use registry::ToolRegistry;
pub use tool::{NoopProgressSink, ProgressSink, ToolHandler, ToolProgress};

use std::sync::Arc;
use std::time::Duration;

/// Wires up a [`ToolRegistry`] with the five built-in handlers rooted at
/// `workdir`, using `tool_timeout` for the `command` handler (§4.4).
pub fn default_registry(workdir: impl Into<std::path::PathBuf>, tool_timeout: Duration) -> ToolRegistry {
    let workdir = workdir.into();
    let mut registry = ToolRegistry::new();
    registry.register(echo_types::ToolKind::Command, builtin::CommandHandler::new(workdir.clone(), tool_timeout));
    registry.register(echo_types::ToolKind::ApplyPatch, builtin::ApplyPatchHandler::new(workdir.clone()));
    registry.register(echo_types::ToolKind::FileRead, builtin::FileReadHandler::new(workdir.clone()));
    registry.register(echo_types::ToolKind::Search, builtin::SearchHandler::new(workdir));
    registry.register(echo_types::ToolKind::UpdatePlan, builtin::UpdatePlanHandler);
    registry
}

pub fn shared_default_registry(workdir: impl Into<std::path::PathBuf>, tool_timeout: Duration) -> Arc<ToolRegistry> {
    Arc::new(default_registry(workdir, tool_timeout))
}

#[cfg(test)]
mod tests {
    use super::*;
    use echo_types::{ToolCall, ToolKind};

    #[tokio::test]
    async fn default_registry_covers_all_five_kinds() {
        let dir = tempfile::tempdir().unwrap();
        let registry = default_registry(dir.path(), Duration::from_secs(5));
        for kind in [
            ToolKind::Command,
            ToolKind::ApplyPatch,
            ToolKind::FileRead,
            ToolKind::Search,
            ToolKind::UpdatePlan,
        ] {
            assert!(registry.get(kind).is_some(), "{kind:?} missing a handler");
        }
        let _ = ToolCall::new("x", ToolKind::Search);
    }
}
