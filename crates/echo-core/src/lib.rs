// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The agent execution core (§1, §2 C2/C4/C5/C6): the event manager that
//! owns SQ/EQ, the tool dispatcher that turns model-initiated tool calls
//! into sandboxed side effects, the per-session execution engine that
//! drives a turn to completion, and the dual-sequence transcript.

mod compact;
mod dispatcher;
mod engine;
mod manager;
mod transcript;

pub use compact::{compact_history, compact_if_needed, emergency_compact};
pub use dispatcher::{ApprovalHandler, Dispatcher, ToolBus};
pub use engine::{EngineConfig, ExecutionEngine, UserInputHandler};
pub use manager::{EventManager, SubmissionHandler};
pub use transcript::Transcript;
