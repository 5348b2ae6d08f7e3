// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};

/// The closed set of tool kinds the core dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    Command,
    ApplyPatch,
    FileRead,
    Search,
    UpdatePlan,
}

impl ToolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolKind::Command => "command",
            ToolKind::ApplyPatch => "apply_patch",
            ToolKind::FileRead => "file_read",
            ToolKind::Search => "search",
            ToolKind::UpdatePlan => "update_plan",
        }
    }
}

/// `{id, kind, command?, path?, patch?, diff?, session_id?, args?}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub kind: ToolKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default)]
    pub args: serde_json::Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, kind: ToolKind) -> Self {
        Self {
            id: id.into(),
            kind,
            command: None,
            path: None,
            patch: None,
            diff: None,
            session_id: None,
            args: serde_json::Value::Null,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Pending,
    Running,
    Completed,
    Error,
    RequiresApproval,
}

/// `{id, kind, status, output?, error?, exit_code?, command?, path?, diff?,
/// approval_id?, approval_reason?}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub id: String,
    pub kind: ToolKind,
    pub status: ToolStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_reason: Option<String>,
}

impl ToolResult {
    pub fn ok(id: impl Into<String>, kind: ToolKind, output: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            status: ToolStatus::Completed,
            output: Some(output.into()),
            error: None,
            exit_code: None,
            command: None,
            path: None,
            diff: None,
            approval_id: None,
            approval_reason: None,
        }
    }

    pub fn err(id: impl Into<String>, kind: ToolKind, error: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            status: ToolStatus::Error,
            output: None,
            error: Some(error.into()),
            exit_code: None,
            command: None,
            path: None,
            diff: None,
            approval_id: None,
            approval_reason: None,
        }
    }

    pub fn requires_approval(
        id: impl Into<String>,
        kind: ToolKind,
        approval_id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            status: ToolStatus::RequiresApproval,
            output: None,
            error: None,
            exit_code: None,
            command: None,
            path: None,
            diff: None,
            approval_id: Some(approval_id.into()),
            approval_reason: Some(reason.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.status, ToolStatus::Error)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolEventType {
    ItemStarted,
    ItemUpdated,
    ItemCompleted,
}

/// `{type, result, reason?}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolEvent {
    #[serde(rename = "type")]
    pub event_type: ToolEventType,
    pub result: ToolResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_result_has_completed_status_and_no_error() {
        let r = ToolResult::ok("1", ToolKind::FileRead, "contents");
        assert_eq!(r.status, ToolStatus::Completed);
        assert!(r.error.is_none());
        assert!(!r.is_error());
    }

    #[test]
    fn requires_approval_carries_id_and_reason() {
        let r = ToolResult::requires_approval("1", ToolKind::Command, "appr-1", "runs rm -rf");
        assert_eq!(r.status, ToolStatus::RequiresApproval);
        assert_eq!(r.approval_id.as_deref(), Some("appr-1"));
    }

    #[test]
    fn tool_call_id_threads_through_serialized_result() {
        let call = ToolCall::new("x1", ToolKind::Search);
        let result = ToolResult::ok(&call.id, call.kind, "a.rs\nb.rs");
        assert_eq!(result.id, "x1");
    }
}
