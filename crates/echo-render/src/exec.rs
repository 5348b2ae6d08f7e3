// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::{HashMap, HashSet};

use echo_types::{Event, EventPayload, EventType, ToolEventType, ToolKind, ToolStatus};
use serde_json::{json, Value};

fn item_type(kind: ToolKind) -> &'static str {
    match kind {
        ToolKind::Command => "command_execution",
        ToolKind::ApplyPatch => "file_change",
        ToolKind::FileRead => "file_read",
        ToolKind::Search => "file_search",
        ToolKind::UpdatePlan => "task_summary",
    }
}

fn word_count(text: &str) -> u32 {
    text.split_whitespace().count() as u32
}

/// Maps the same EQ stream the TUI renders into stable, lowercase-snake
/// JSONL event objects (§4.8, §6). Every emitted object carries `thread_id`
/// and `session_id`; unknown optional fields are simply omitted by
/// `serde_json`'s default `Value` construction.
pub struct ExecRenderer {
    thread_id: String,
    session_id: String,
    agent_message_started: HashSet<String>,
    pending_approvals: HashSet<String>,
    usage: HashMap<String, (u32, u32)>,
}

impl ExecRenderer {
    pub fn new(thread_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            session_id: session_id.into(),
            agent_message_started: HashSet::new(),
            pending_approvals: HashSet::new(),
            usage: HashMap::new(),
        }
    }

    /// Emitted once at process start, not tied to any particular EQ event.
    pub fn thread_started(&self) -> Value {
        json!({ "type": "thread.started", "thread_id": self.thread_id, "session_id": self.session_id })
    }

    fn envelope(&self, event_type: &str) -> Value {
        json!({ "type": event_type, "thread_id": self.thread_id, "session_id": self.session_id })
    }

    /// Translates one EQ [`Event`] into zero or more JSONL objects.
    pub fn render(&mut self, event: &Event) -> Vec<Value> {
        match event.event_type {
            EventType::SubmissionAccepted => {
                if let EventPayload::SubmissionAccepted { operation } = &event.payload {
                    if let Some(items) = operation.get("items").and_then(|v| v.as_array()) {
                        let input_words: u32 = items
                            .iter()
                            .filter_map(|i| i.get("text").and_then(|t| t.as_str()))
                            .map(word_count)
                            .sum();
                        self.usage.entry(event.submission_id.clone()).or_insert((0, 0)).0 = input_words;
                    }
                }
                vec![]
            }
            EventType::TaskStarted => vec![self.envelope("turn.started")],
            EventType::AgentOutput => {
                let EventPayload::AgentOutput(out) = &event.payload else { return vec![] };
                if out.is_final {
                    let mut obj = self.envelope("item.completed");
                    obj["item"] = json!({
                        "id": event.submission_id,
                        "type": "agent_message",
                        "status": "completed",
                        "text": out.content,
                    });
                    let entry = self.usage.entry(event.submission_id.clone()).or_insert((0, 0));
                    entry.1 = word_count(&out.content);
                    vec![obj]
                } else if self.agent_message_started.insert(event.submission_id.clone()) {
                    let mut obj = self.envelope("item.started");
                    obj["item"] = json!({ "id": event.submission_id, "type": "agent_message", "status": "in_progress" });
                    vec![obj]
                } else {
                    vec![]
                }
            }
            EventType::ToolEvent => {
                let EventPayload::ToolEvent(tool_event) = &event.payload else { return vec![] };
                self.render_tool_event(tool_event)
            }
            EventType::PlanUpdated => {
                let EventPayload::PlanUpdated(plan) = &event.payload else { return vec![] };
                let text = render_plan_text(plan);
                let mut obj = self.envelope("item.completed");
                obj["item"] = json!({ "id": event.submission_id, "type": "task_summary", "status": "completed", "text": text });
                vec![obj]
            }
            EventType::TaskSummary => {
                let EventPayload::TaskSummary { text } = &event.payload else { return vec![] };
                let mut obj = self.envelope("item.completed");
                obj["item"] = json!({ "id": event.submission_id, "type": "task_summary", "status": "completed", "text": text });
                vec![obj]
            }
            EventType::TaskCompleted => {
                let EventPayload::TaskCompleted(completed) = &event.payload else { return vec![] };
                let (input_tokens, output_tokens) = self.usage.remove(&event.submission_id).unwrap_or((0, 0));
                match completed.status {
                    echo_types::TaskStatus::Completed => {
                        let mut obj = self.envelope("turn.completed");
                        obj["usage"] = json!({
                            "input_tokens": input_tokens,
                            "output_tokens": output_tokens,
                            "cached_input_tokens": 0,
                        });
                        vec![obj]
                    }
                    echo_types::TaskStatus::Failed => {
                        let mut obj = self.envelope("turn.failed");
                        obj["error"] = json!(completed.error.clone().unwrap_or_default());
                        vec![obj]
                    }
                }
            }
            EventType::TaskError => vec![],
        }
    }

    fn render_tool_event(&mut self, tool_event: &echo_types::ToolEvent) -> Vec<Value> {
        let result = &tool_event.result;
        if result.status == ToolStatus::RequiresApproval {
            self.pending_approvals.insert(result.id.clone());
            let mut obj = json!({
                "type": "approval.requested",
                "thread_id": self.thread_id,
                "session_id": self.session_id,
                "approval_id": result.approval_id,
            });
            if let Some(reason) = &result.approval_reason {
                obj["reason"] = json!(reason);
            }
            return vec![obj];
        }

        let was_pending = self.pending_approvals.remove(&result.id);
        let mut out = Vec::new();
        if was_pending {
            out.push(json!({
                "type": "approval.completed",
                "thread_id": self.thread_id,
                "session_id": self.session_id,
                "approval_id": result.approval_id,
                "approved": result.status != ToolStatus::Error,
            }));
        }

        let event_name = match tool_event.event_type {
            ToolEventType::ItemStarted => "item.started",
            ToolEventType::ItemUpdated => "item.updated",
            ToolEventType::ItemCompleted => "item.completed",
        };
        let status = match result.status {
            ToolStatus::Completed => "completed",
            ToolStatus::Error => "failed",
            _ => "in_progress",
        };
        let mut item = json!({
            "id": result.id,
            "type": item_type(result.kind),
            "status": status,
        });
        if let Some(text) = result.output.as_ref().or(result.error.as_ref()) {
            item["text"] = json!(text);
        }
        if let Some(command) = &result.command {
            item["command"] = json!(command);
        }
        if let Some(path) = &result.path {
            item["path"] = json!(path);
        }
        if let Some(exit_code) = result.exit_code {
            item["exit_code"] = json!(exit_code);
        }

        let mut obj = json!({ "type": event_name, "thread_id": self.thread_id, "session_id": self.session_id });
        obj["item"] = item;
        out.push(obj);
        out
    }

    /// Compact `"[type] text"` fallback line for human (non-JSON) mode.
    pub fn human_line(value: &Value) -> Option<String> {
        let event_type = value.get("type")?.as_str()?;
        let text = value
            .pointer("/item/text")
            .and_then(|v| v.as_str())
            .or_else(|| value.get("error").and_then(|v| v.as_str()))
            .unwrap_or("");
        Some(format!("[{event_type}] {text}"))
    }
}

fn render_plan_text(plan: &echo_types::event::PlanUpdate) -> String {
    let mut lines = Vec::new();
    if let Some(explanation) = &plan.explanation {
        lines.push(explanation.clone());
    }
    for step in &plan.plan {
        let marker = match step.status {
            echo_types::event::PlanStepStatus::Pending => "[ ]",
            echo_types::event::PlanStepStatus::InProgress => "[~]",
            echo_types::event::PlanStepStatus::Completed => "[x]",
        };
        lines.push(format!("{marker} {}", step.step));
    }
    lines.join("\n")
}
