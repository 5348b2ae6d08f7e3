// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};

/// `{role ∈ {user, assistant, system, tool}, content: text}`.
///
/// The `Tool` role is view-only: it must never be persisted in a
/// [`crate::SessionRecord`] nor resent to the model as part of the persisted
/// history. Engine-injected `System` messages share the same exclusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn tool(content: impl Into<String>) -> Self {
        Self { role: Role::Tool, content: content.into() }
    }

    /// Whether this message must be excluded from persisted history (invariant 3).
    pub fn is_persistable(&self) -> bool {
        matches!(self.role, Role::User | Role::Assistant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_user_and_assistant_are_persistable() {
        assert!(Message::user("hi").is_persistable());
        assert!(Message::assistant("hi").is_persistable());
        assert!(!Message::system("hi").is_persistable());
        assert!(!Message::tool("hi").is_persistable());
    }
}
