// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Model client interface, consumed (not owned) by the execution engine, plus
//! one concrete transport and a deterministic mock for tests.

mod anthropic;
mod mock;
mod provider;
mod types;

pub use anthropic::AnthropicProvider;
pub use mock::MockProvider;
pub use provider::{ModelProvider, ResponseStream};
pub use types::{
    CompletionRequest, ContentPart, FunctionCall, Message, MessageContent, Role, ToolContentPart,
    ToolResultContent, ToolSchema, Usage,
};
pub use types::ResponseEvent;
