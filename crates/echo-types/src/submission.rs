// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type SubmissionId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Normal,
    High,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

/// A single user-supplied input item (text or an attachment reference).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputMessage {
    pub text: String,
    /// Path to an attachment file this item represents, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_path: Option<String>,
    /// `true` when `attachment_path` names an image rather than text.
    #[serde(default)]
    pub is_image: bool,
}

impl InputMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into(), attachment_path: None, is_image: false }
    }
}

/// `{session_id, model, system, output_schema, instructions[], language,
/// reasoning_effort, review_mode, attachments:[InputMessage], metadata}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputContext {
    pub session_id: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub system: Option<String>,
    #[serde(default)]
    pub output_schema: Option<serde_json::Value>,
    #[serde(default)]
    pub instructions: Vec<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub reasoning_effort: Option<String>,
    #[serde(default)]
    pub review_mode: bool,
    #[serde(default)]
    pub attachments: Vec<InputMessage>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Tagged union of everything that can be posted to the Submission Queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum SubmissionOperation {
    UserInput { items: Vec<InputMessage>, context: InputContext },
    Interrupt {},
    /// Always present in the protocol even though the policy/sandbox layer
    /// itself is a stub — real tools can still emit `requires_approval`.
    ApprovalDecision { approval_id: String, approved: bool },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: SubmissionId,
    #[serde(flatten)]
    pub operation: SubmissionOperation,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub priority: Priority,
    pub session_id: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Submission {
    pub fn new(session_id: impl Into<String>, operation: SubmissionOperation) -> Self {
        let session_id = session_id.into();
        Self {
            id: Uuid::new_v4().to_string(),
            operation,
            timestamp: Utc::now(),
            priority: Priority::Normal,
            session_id,
            metadata: HashMap::new(),
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_submission_gets_a_fresh_id_and_normal_priority() {
        let s = Submission::new(
            "sess-1",
            SubmissionOperation::Interrupt {},
        );
        assert!(!s.id.is_empty());
        assert_eq!(s.priority, Priority::Normal);
        assert_eq!(s.session_id, "sess-1");
    }

    #[test]
    fn approval_decision_round_trips_through_json() {
        let s = Submission::new(
            "sess-1",
            SubmissionOperation::ApprovalDecision { approval_id: "t1".into(), approved: true },
        );
        let json = serde_json::to_string(&s).unwrap();
        let back: Submission = serde_json::from_str(&json).unwrap();
        match back.operation {
            SubmissionOperation::ApprovalDecision { approval_id, approved } => {
                assert_eq!(approval_id, "t1");
                assert!(approved);
            }
            _ => panic!("wrong variant"),
        }
    }
}
