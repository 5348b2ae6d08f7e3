// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Closed-sum-type data model shared by every component of the agent core.
//!
//! Operation and event payloads are tagged unions keyed by an explicit
//! discriminant (`kind` / `type`), never structural duck-typing, so that the
//! JSONL wire format stays stable independent of the in-process enum layout.

pub mod event;
pub mod session;
pub mod submission;
pub mod tool;
pub mod transcript;

pub use event::{
    AgentOutput, Event, EventPayload, EventType, PlanStep, PlanStepStatus, PlanUpdate,
    TaskCompleted, TaskStatus,
};
pub use session::SessionRecord;
pub use submission::{
    InputContext, InputMessage, Priority, Submission, SubmissionId, SubmissionOperation,
};
pub use tool::{ToolCall, ToolEvent, ToolEventType, ToolKind, ToolResult, ToolStatus};
pub use transcript::{Message, Role};
