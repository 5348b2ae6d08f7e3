// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tool::ToolEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    SubmissionAccepted,
    TaskStarted,
    TaskCompleted,
    AgentOutput,
    ToolEvent,
    PlanUpdated,
    TaskSummary,
    TaskError,
}

/// `{content: text, final: bool, sequence: int, metadata}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentOutput {
    pub content: String,
    #[serde(rename = "final")]
    pub is_final: bool,
    pub sequence: u64,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    pub step: String,
    pub status: PlanStepStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStepStatus {
    Pending,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanUpdate {
    pub explanation: Option<String>,
    pub plan: Vec<PlanStep>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskCompleted {
    pub status: TaskStatus,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Completed,
    Failed,
}

/// Tagged-union payload; the discriminant is `EventType`, mirrored in `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventPayload {
    SubmissionAccepted { operation: serde_json::Value },
    TaskStarted {},
    AgentOutput(AgentOutput),
    ToolEvent(ToolEvent),
    PlanUpdated(PlanUpdate),
    TaskSummary { text: String },
    TaskCompleted(TaskCompleted),
    TaskError { message: String },
}

/// `{type, submission_id, session_id, timestamp, payload, metadata}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub submission_id: String,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub payload: EventPayload,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Event {
    pub fn new(
        event_type: EventType,
        submission_id: impl Into<String>,
        session_id: impl Into<String>,
        payload: EventPayload,
    ) -> Self {
        Self {
            event_type,
            submission_id: submission_id.into(),
            session_id: session_id.into(),
            timestamp: Utc::now(),
            payload,
            metadata: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_output_final_flag_round_trips() {
        let out = AgentOutput { content: "hi".into(), is_final: true, sequence: 1, metadata: HashMap::new() };
        let json = serde_json::to_string(&out).unwrap();
        assert!(json.contains("\"final\":true"));
        let back: AgentOutput = serde_json::from_str(&json).unwrap();
        assert!(back.is_final);
    }

    #[test]
    fn event_carries_its_submission_id() {
        let e = Event::new(
            EventType::TaskStarted,
            "sub-1",
            "sess-1",
            EventPayload::TaskStarted {},
        );
        assert_eq!(e.submission_id, "sub-1");
        assert_eq!(e.event_type, EventType::TaskStarted);
    }
}
