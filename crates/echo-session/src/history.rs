// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::io::{BufRead, Write};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One line of `~/.echo/history.jsonl`: `{text, ts}` (§6). Backs the
/// composer's prompt-history navigation (§4.7).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub text: String,
    pub ts: DateTime<Utc>,
}

pub struct PromptHistory {
    path: PathBuf,
}

impl PromptHistory {
    pub fn new(echo_home: impl Into<PathBuf>) -> Self {
        Self { path: echo_home.into().join("history.jsonl") }
    }

    /// Appends one entry. Never errors the caller's flow on failure to
    /// persist — callers may choose to log and continue (§7 item 7).
    pub fn append(&self, text: &str) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let entry = HistoryEntry { text: text.to_string(), ts: Utc::now() };
        let line = serde_json::to_string(&entry)?;
        let mut file = std::fs::OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    /// All entries in file order (oldest first). Malformed lines are skipped
    /// rather than failing the whole read (§5: readers tolerate bad state).
    pub fn load(&self) -> anyhow::Result<Vec<HistoryEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = std::fs::File::open(&self.path)?;
        let reader = std::io::BufReader::new(file);
        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            if let Ok(entry) = serde_json::from_str::<HistoryEntry>(&line) {
                entries.push(entry);
            }
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_then_load_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let history = PromptHistory::new(dir.path());
        history.append("first").unwrap();
        history.append("second").unwrap();
        let entries = history.load().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].text, "first");
        assert_eq!(entries[1].text, "second");
    }

    #[test]
    fn load_missing_file_is_empty_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let history = PromptHistory::new(dir.path());
        assert!(history.load().unwrap().is_empty());
    }

    #[test]
    fn malformed_line_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.jsonl");
        std::fs::write(&path, "not json\n{\"text\":\"ok\",\"ts\":\"2024-01-01T00:00:00Z\"}\n").unwrap();
        let history = PromptHistory::new(dir.path());
        let entries = history.load().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].text, "ok");
    }
}
