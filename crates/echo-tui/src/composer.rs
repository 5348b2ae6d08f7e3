// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Multi-line input composer (§4.7).
//!
//! Grows from one line up to `MAX_LINES`. `Enter` submits unless a turn is
//! already running, in which case the text is queued instead; queued
//! entries drain FIFO as each turn completes (§8 property 9). `Up`/`Down`
//! only browse prompt history while the buffer is a single line, so they
//! do not fight with in-buffer cursor movement once the user has typed a
//! multi-line message.

use std::collections::VecDeque;

pub const MAX_LINES: usize = 6;

/// What pressing Enter resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// No turn is in flight: send this text now.
    Immediate(String),
    /// A turn is already running: queued for later (§8 property 9).
    Queued(String),
    /// The composer was empty; nothing happened.
    Empty,
}

pub struct Composer {
    lines: Vec<String>,
    cursor_line: usize,
    cursor_col: usize,
    queued: VecDeque<String>,
    history: Vec<String>,
    history_cursor: Option<usize>,
    draft_before_history: Option<String>,
}

impl Default for Composer {
    fn default() -> Self {
        Self::new()
    }
}

impl Composer {
    pub fn new() -> Self {
        Self {
            lines: vec![String::new()],
            cursor_line: 0,
            cursor_col: 0,
            queued: VecDeque::new(),
            history: Vec::new(),
            history_cursor: None,
            draft_before_history: None,
        }
    }

    pub fn set_history(&mut self, entries: Vec<String>) {
        self.history = entries;
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    pub fn is_empty(&self) -> bool {
        self.lines.len() == 1 && self.lines[0].is_empty()
    }

    pub fn height(&self) -> u16 {
        self.lines.len().min(MAX_LINES) as u16
    }

    pub fn is_single_line(&self) -> bool {
        self.lines.len() == 1
    }

    pub fn insert_char(&mut self, c: char) {
        self.history_cursor = None;
        let line = &mut self.lines[self.cursor_line];
        let byte_idx = char_byte_index(line, self.cursor_col);
        line.insert(byte_idx, c);
        self.cursor_col += 1;
    }

    /// `Alt+Enter`: insert a newline, growing the composer up to `MAX_LINES`.
    pub fn insert_newline(&mut self) {
        if self.lines.len() >= MAX_LINES {
            return;
        }
        self.history_cursor = None;
        let line = &mut self.lines[self.cursor_line];
        let byte_idx = char_byte_index(line, self.cursor_col);
        let rest = line.split_off(byte_idx);
        self.lines.insert(self.cursor_line + 1, rest);
        self.cursor_line += 1;
        self.cursor_col = 0;
    }

    pub fn backspace(&mut self) {
        if self.cursor_col > 0 {
            let line = &mut self.lines[self.cursor_line];
            let byte_idx = char_byte_index(line, self.cursor_col - 1);
            line.remove(byte_idx);
            self.cursor_col -= 1;
        } else if self.cursor_line > 0 {
            let current = self.lines.remove(self.cursor_line);
            self.cursor_line -= 1;
            self.cursor_col = self.lines[self.cursor_line].chars().count();
            self.lines[self.cursor_line].push_str(&current);
        }
    }

    /// `Enter`: submit now, or queue if `turn_pending` (§4.7, §8 property 9).
    pub fn submit(&mut self, turn_pending: bool) -> SubmitOutcome {
        let text = self.text();
        if text.trim().is_empty() {
            return SubmitOutcome::Empty;
        }
        self.clear();
        if turn_pending {
            self.queued.push_back(text.clone());
            SubmitOutcome::Queued(text)
        } else {
            SubmitOutcome::Immediate(text)
        }
    }

    /// Pops the next queued message, if any, to submit as a fresh
    /// submission once the in-flight turn completes (§8 property 9).
    pub fn pop_queued(&mut self) -> Option<String> {
        self.queued.pop_front()
    }

    pub fn queued_len(&self) -> usize {
        self.queued.len()
    }

    pub fn queued_messages(&self) -> impl Iterator<Item = &String> {
        self.queued.iter()
    }

    pub fn clear(&mut self) {
        self.lines = vec![String::new()];
        self.cursor_line = 0;
        self.cursor_col = 0;
        self.history_cursor = None;
        self.draft_before_history = None;
    }

    /// `Up` in single-line mode: browse toward older history entries.
    pub fn history_prev(&mut self) {
        if !self.is_single_line() || self.history.is_empty() {
            return;
        }
        let next = match self.history_cursor {
            None => {
                self.draft_before_history = Some(self.lines[0].clone());
                self.history.len() - 1
            }
            Some(0) => 0,
            Some(i) => i - 1,
        };
        self.history_cursor = Some(next);
        self.lines[0] = self.history[next].clone();
        self.cursor_col = self.lines[0].chars().count();
    }

    /// `Down` in single-line mode: browse toward newer history, then back
    /// to the draft the user was typing before entering history mode.
    pub fn history_next(&mut self) {
        let Some(i) = self.history_cursor else { return };
        if i + 1 < self.history.len() {
            self.history_cursor = Some(i + 1);
            self.lines[0] = self.history[i + 1].clone();
        } else {
            self.history_cursor = None;
            self.lines[0] = self.draft_before_history.take().unwrap_or_default();
        }
        self.cursor_col = self.lines[0].chars().count();
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

fn char_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices().nth(char_idx).map(|(i, _)| i).unwrap_or(s.len())
}
