// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use echo_types::{Message, Role};

/// Append-only conversation model with two parallel sequences (§3, §4.6,
/// §9 "Transcript duality"): `history` (persistable — user/assistant only)
/// and `view` (history plus tool blocks and plan renderings). Both grow
/// monotonically within a session; `view` is a superset of `history`.
#[derive(Debug, Default)]
pub struct Transcript {
    history: Vec<Message>,
    view: Vec<ViewEntry>,
    last_render: Vec<String>,
}

#[derive(Debug, Clone)]
enum ViewEntry {
    Message(Message),
    ToolBlock(String),
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_user(&mut self, text: impl Into<String>) {
        let msg = Message::user(text);
        self.view.push(ViewEntry::Message(msg.clone()));
        self.history.push(msg);
    }

    /// Appends to the last assistant message if the view's tail is one,
    /// otherwise starts a fresh assistant message (§4.6).
    pub fn append_assistant_chunk(&mut self, text: &str) {
        if let Some(ViewEntry::Message(m)) = self.view.last_mut() {
            if m.role == Role::Assistant {
                m.content.push_str(text);
                if let Some(h) = self.history.last_mut() {
                    if h.role == Role::Assistant {
                        h.content.push_str(text);
                    }
                }
                return;
            }
        }
        let msg = Message::assistant(text.to_string());
        self.view.push(ViewEntry::Message(msg.clone()));
        self.history.push(msg);
    }

    /// Replaces the last assistant message's content with the authoritative
    /// final text, when non-empty (§4.5: "Empty final_text with non-empty
    /// accumulator → emit accumulator", handled by the caller before this).
    pub fn finalize_assistant(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        match self.view.last_mut() {
            Some(ViewEntry::Message(m)) if m.role == Role::Assistant => {
                m.content = text.to_string();
            }
            _ => {
                self.view.push(ViewEntry::Message(Message::assistant(text.to_string())));
            }
        }
        match self.history.last_mut() {
            Some(h) if h.role == Role::Assistant => h.content = text.to_string(),
            _ => self.history.push(Message::assistant(text.to_string())),
        }
    }

    /// View-only: never reaches `history` nor any prompt rebuilt from it.
    pub fn append_tool_block(&mut self, text: impl Into<String>) {
        self.view.push(ViewEntry::ToolBlock(text.into()));
    }

    /// Clears and re-hydrates from a persisted session's messages. Any
    /// `tool`-role entry (should never occur per invariant 3, but tolerated)
    /// is routed to the view only, never to `history` (§4.6, §4.5 seed_history).
    pub fn load_messages(&mut self, messages: &[Message]) {
        self.history.clear();
        self.view.clear();
        for m in messages {
            if m.is_persistable() {
                self.history.push(m.clone());
                self.view.push(ViewEntry::Message(m.clone()));
            } else {
                self.view.push(ViewEntry::ToolBlock(format!("[{:?}] {}", m.role, m.content)));
            }
        }
    }

    /// Persistable view: invariant 4 of §8 — only user/assistant messages.
    pub fn messages(&self) -> &[Message] {
        &self.history
    }

    pub fn view_messages(&self) -> Vec<String> {
        self.view
            .iter()
            .map(|e| match e {
                ViewEntry::Message(m) => format!("{:?}: {}", m.role, m.content),
                ViewEntry::ToolBlock(text) => text.clone(),
            })
            .collect()
    }

    /// Full list of styled lines, wrapped to `width`.
    pub fn render_view_lines(&self, width: usize) -> Vec<String> {
        let width = width.max(1);
        let mut lines = Vec::new();
        for entry in &self.view {
            let text = match entry {
                ViewEntry::Message(m) => format!("{:?}: {}", m.role, m.content),
                ViewEntry::ToolBlock(t) => t.clone(),
            };
            for raw_line in text.split('\n') {
                lines.extend(wrap(raw_line, width));
            }
        }
        lines
    }

    /// Compares the current render against the previous one and returns
    /// only the trailing lines that changed — the delta API §4.6 describes
    /// for flicker-free terminal append (§4.7 diff-aware viewport).
    pub fn render_delta(&mut self, width: usize) -> Vec<String> {
        let rendered = self.render_view_lines(width);
        let common = self
            .last_render
            .iter()
            .zip(rendered.iter())
            .take_while(|(a, b)| a == b)
            .count();
        let delta = if common == self.last_render.len() {
            rendered[common..].to_vec()
        } else {
            rendered.clone()
        };
        self.last_render = rendered;
        delta
    }
}

fn wrap(line: &str, width: usize) -> Vec<String> {
    if line.is_empty() {
        return vec![String::new()];
    }
    let chars: Vec<char> = line.chars().collect();
    chars.chunks(width).map(|c| c.iter().collect()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_contains_only_user_and_assistant() {
        let mut t = Transcript::new();
        t.append_user("hi");
        t.append_assistant_chunk("par");
        t.finalize_assistant("partial answer");
        t.append_tool_block("ran a command");
        assert_eq!(t.messages().len(), 2);
        assert!(t.messages().iter().all(|m| m.is_persistable()));
    }

    #[test]
    fn load_messages_routes_tool_role_to_view_only() {
        let mut t = Transcript::new();
        t.load_messages(&[
            Message::user("a"),
            Message::assistant("b"),
            Message::tool("ran ls"),
            Message::system("injected"),
        ]);
        assert_eq!(t.messages().len(), 2);
        assert_eq!(t.view_messages().len(), 4);
    }

    #[test]
    fn append_assistant_chunk_accumulates_into_one_message() {
        let mut t = Transcript::new();
        t.append_user("hi");
        t.append_assistant_chunk("Hel");
        t.append_assistant_chunk("lo");
        assert_eq!(t.messages().last().unwrap().content, "Hello");
    }

    #[test]
    fn finalize_replaces_streamed_content_when_non_empty() {
        let mut t = Transcript::new();
        t.append_user("hi");
        t.append_assistant_chunk("partial");
        t.finalize_assistant("final answer");
        assert_eq!(t.messages().last().unwrap().content, "final answer");
    }

    #[test]
    fn finalize_with_empty_text_leaves_accumulator_untouched() {
        let mut t = Transcript::new();
        t.append_user("hi");
        t.append_assistant_chunk("accumulated");
        t.finalize_assistant("");
        assert_eq!(t.messages().last().unwrap().content, "accumulated");
    }

    #[test]
    fn render_delta_emits_only_appended_tail() {
        let mut t = Transcript::new();
        t.append_user("hi");
        let first = t.render_delta(80);
        assert!(!first.is_empty());
        t.append_tool_block("more");
        let second = t.render_delta(80);
        assert_eq!(second, vec!["more".to_string()]);
    }

    #[test]
    fn render_delta_is_empty_when_nothing_changed() {
        let mut t = Transcript::new();
        t.append_user("hi");
        t.render_delta(80);
        let delta = t.render_delta(80);
        assert!(delta.is_empty());
    }
}
