// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::{Path, PathBuf};

use anyhow::Context;
use echo_types::SessionRecord;
use uuid::Uuid;

/// `~/.echo/sessions/<uuid>.json`, honouring `$ECHO_HOME` (§6).
pub fn sessions_dir(echo_home: &Path) -> PathBuf {
    echo_home.join("sessions")
}

fn session_path(echo_home: &Path, id: &str) -> PathBuf {
    sessions_dir(echo_home).join(format!("{id}.json"))
}

/// File-backed session store. Readers tolerate a missing file (§5); writes
/// are atomic write-then-rename so a reader never observes a half-written
/// session (§5, §7 item 7).
pub struct SessionStore {
    root: PathBuf,
}

impl SessionStore {
    pub fn new(echo_home: impl Into<PathBuf>) -> Self {
        Self { root: echo_home.into() }
    }

    pub fn new_session(&self, workdir: impl Into<String>) -> SessionRecord {
        SessionRecord::new(Uuid::new_v4().to_string(), workdir)
    }

    pub fn load(&self, id: &str) -> anyhow::Result<Option<SessionRecord>> {
        let path = session_path(&self.root, id);
        if !path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&path).with_context(|| format!("reading session {}", path.display()))?;
        Ok(Some(serde_json::from_str(&text)?))
    }

    /// Most recently updated session, or `None` if no sessions exist yet.
    pub fn load_last(&self) -> anyhow::Result<Option<SessionRecord>> {
        let dir = sessions_dir(&self.root);
        if !dir.exists() {
            return Ok(None);
        }
        let mut best: Option<SessionRecord> = None;
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            if entry.path().extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let text = std::fs::read_to_string(entry.path())?;
            let Ok(record) = serde_json::from_str::<SessionRecord>(&text) else { continue };
            match &best {
                Some(b) if b.updated_at >= record.updated_at => {}
                _ => best = Some(record),
            }
        }
        Ok(best)
    }

    pub fn list(&self) -> anyhow::Result<Vec<SessionRecord>> {
        let dir = sessions_dir(&self.root);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut records = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            if entry.path().extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Ok(text) = std::fs::read_to_string(entry.path()) {
                if let Ok(record) = serde_json::from_str::<SessionRecord>(&text) {
                    records.push(record);
                }
            }
        }
        records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(records)
    }

    pub fn save(&self, record: &SessionRecord) -> anyhow::Result<()> {
        let dir = sessions_dir(&self.root);
        std::fs::create_dir_all(&dir).with_context(|| format!("creating sessions dir {}", dir.display()))?;
        let path = session_path(&self.root, &record.id);
        let text = serde_json::to_string_pretty(record)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, text)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use echo_types::Message;

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let mut record = store.new_session("/work");
        record.push(Message::user("hi"));
        store.save(&record).unwrap();
        let loaded = store.load(&record.id).unwrap().unwrap();
        assert_eq!(loaded.messages.len(), 1);
    }

    #[test]
    fn load_missing_session_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        assert!(store.load("does-not-exist").unwrap().is_none());
    }

    #[test]
    fn load_last_returns_most_recently_updated() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let mut older = store.new_session("/work");
        older.updated_at = chrono::Utc::now() - chrono::Duration::hours(1);
        store.save(&older).unwrap();
        let newer = store.new_session("/work");
        store.save(&newer).unwrap();
        let last = store.load_last().unwrap().unwrap();
        assert_eq!(last.id, newer.id);
    }

    #[test]
    fn list_returns_every_saved_session() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        store.save(&store.new_session("/a")).unwrap();
        store.save(&store.new_session("/b")).unwrap();
        assert_eq!(store.list().unwrap().len(), 2);
    }
}
