// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::transcript::Message;

/// `{id, workdir, messages, updated_at}`.
///
/// `messages` is the persistable conversation only — `tool` role and
/// engine-injected `system` messages must never reach this struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub workdir: String,
    pub messages: Vec<Message>,
    pub updated_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn new(id: impl Into<String>, workdir: impl Into<String>) -> Self {
        Self { id: id.into(), workdir: workdir.into(), messages: Vec::new(), updated_at: Utc::now() }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_has_empty_history() {
        let s = SessionRecord::new("s1", "/tmp/work");
        assert!(s.messages.is_empty());
        assert_eq!(s.id, "s1");
    }
}
