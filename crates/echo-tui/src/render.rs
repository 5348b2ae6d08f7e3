// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Per-event transcript rendering (§4.6): a small `EventType → behaviour`
//! dispatch that mutates a [`Transcript`] and a [`PlanSection`] as events
//! arrive from the EQ, plus the tool-block text formatter both the TUI and
//! `/approve`-style hints read from.

use echo_core::Transcript;
use echo_types::{Event, EventPayload, EventType, ToolEventType, ToolKind, ToolResult, ToolStatus};

use crate::plan::PlanSection;

fn tool_verb(kind: ToolKind) -> &'static str {
    match kind {
        ToolKind::Command => "Running",
        ToolKind::ApplyPatch => "Applying patch",
        ToolKind::FileRead => "Reading",
        ToolKind::Search => "Searching",
        ToolKind::UpdatePlan => "Updating plan",
    }
}

fn tool_icon(kind: ToolKind) -> &'static str {
    match kind {
        ToolKind::Command => "▶",
        ToolKind::ApplyPatch => "✎",
        ToolKind::FileRead => "▤",
        ToolKind::Search => "⌕",
        ToolKind::UpdatePlan => "≡",
    }
}

fn salient_field(result: &ToolResult) -> Option<&str> {
    result.command.as_deref().or(result.path.as_deref())
}

/// Indented `  └ label: value` detail line, omitted when `value` is `None`.
fn detail_line(label: &str, value: Option<String>) -> Option<String> {
    value.map(|v| format!("  └ {label}: {v}"))
}

const MAX_BODY_LINES: usize = 60;

fn truncated_block(heading: &str, body: &str) -> String {
    let lines: Vec<&str> = body.lines().collect();
    if lines.len() <= MAX_BODY_LINES {
        format!("{heading}\n{body}")
    } else {
        let kept = lines[..MAX_BODY_LINES].join("\n");
        format!("{heading}\n{kept}\n  (truncated)")
    }
}

/// Formats one `tool.event` as plain, unwrapped, ANSI-free text suitable for
/// `Transcript::append_tool_block` (§4.6 "Tool block formatting").
pub fn format_tool_block(event_type: ToolEventType, result: &ToolResult, reason: Option<&str>) -> String {
    match event_type {
        ToolEventType::ItemStarted => {
            let field = salient_field(result).map(|f| format!(" {f}")).unwrap_or_default();
            format!("{} {}{}", tool_icon(result.kind), tool_verb(result.kind), field)
        }
        ToolEventType::ItemUpdated if result.status == ToolStatus::RequiresApproval => {
            let id = result.approval_id.as_deref().unwrap_or("?");
            let reason = reason.or(result.approval_reason.as_deref()).unwrap_or("");
            format!(
                "⚠ approval required (id {id}): {reason}\n  use /approve {id} or /deny {id}"
            )
        }
        ToolEventType::ItemUpdated => {
            result.output.clone().map(|o| format!("  {o}")).unwrap_or_default()
        }
        ToolEventType::ItemCompleted => {
            let ok = !result.is_error();
            let icon = if ok { "✓" } else { "✗" };
            let mut lines = vec![format!("{icon} {:?} {:?}", result.kind, result.status)];
            lines.extend(detail_line("command", result.command.clone()));
            lines.extend(detail_line("path", result.path.clone()));
            lines.extend(detail_line("exit_code", result.exit_code.map(|c| c.to_string())));
            lines.extend(detail_line("error", result.error.clone()));
            let mut block = lines.join("\n");
            if let Some(diff) = &result.diff {
                block.push('\n');
                block.push_str(&truncated_block("diff:", diff));
            } else if let Some(output) = &result.output {
                block.push('\n');
                block.push_str(&truncated_block("output:", output));
            }
            block
        }
    }
}

/// Drives the TUI-side transcript/plan mutation for one EQ event (§4.6 table).
/// Returns the submission id to adopt as "active", if the event started one.
pub struct TuiEventRenderer {
    pub active_submission: Option<String>,
}

impl Default for TuiEventRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TuiEventRenderer {
    pub fn new() -> Self {
        Self { active_submission: None }
    }

    /// Applies one event to `transcript`/`plan`. The caller already echoed
    /// the user's own input locally, so `submission.accepted` is a no-op
    /// here beyond tracking which submission is now active.
    pub fn apply(&mut self, event: &Event, transcript: &mut Transcript, plan: &mut PlanSection) {
        match event.event_type {
            EventType::SubmissionAccepted => {
                self.active_submission = Some(event.submission_id.clone());
            }
            EventType::TaskStarted => {}
            EventType::AgentOutput => {
                if self.active_submission.as_deref() != Some(event.submission_id.as_str()) {
                    return;
                }
                if let EventPayload::AgentOutput(output) = &event.payload {
                    if output.is_final {
                        transcript.finalize_assistant(&output.content);
                    } else {
                        transcript.append_assistant_chunk(&output.content);
                    }
                }
            }
            EventType::ToolEvent => {
                if let EventPayload::ToolEvent(tool_event) = &event.payload {
                    let text = format_tool_block(tool_event.event_type, &tool_event.result, tool_event.reason.as_deref());
                    if !text.is_empty() {
                        transcript.append_tool_block(&text);
                    }
                }
            }
            EventType::PlanUpdated => {
                if let EventPayload::PlanUpdated(update) = &event.payload {
                    plan.update(update.clone());
                }
            }
            EventType::TaskSummary => {
                if let EventPayload::TaskSummary { text } = &event.payload {
                    transcript.append_tool_block(text);
                }
            }
            EventType::TaskCompleted => {
                if self.active_submission.as_deref() == Some(event.submission_id.as_str()) {
                    self.active_submission = None;
                }
            }
            EventType::TaskError => {
                if let EventPayload::TaskError { message } = &event.payload {
                    transcript.append_tool_block(&format!("✗ error: {message}"));
                }
            }
        }
    }
}
