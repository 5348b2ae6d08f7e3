// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use ratatui::layout::{Constraint, Direction, Layout, Rect};

/// Top-to-bottom region split for one frame (§4.7): session card, optional
/// plan section, optional quick-help, the conversation viewport, the
/// status line, the composer, and the hints footer.
pub struct AppLayout {
    pub session_card: Rect,
    pub plan: Option<Rect>,
    pub chat: Rect,
    pub status: Rect,
    pub composer: Rect,
    pub hints: Rect,
}

impl AppLayout {
    /// `plan_lines` is `0` when there is no plan snapshot to show; `composer_lines`
    /// is the composer's current grown height, clamped by the caller to 1..=6.
    pub fn compute(area: Rect, plan_lines: u16, composer_lines: u16) -> Self {
        let mut constraints = vec![Constraint::Length(1)]; // session card
        if plan_lines > 0 {
            constraints.push(Constraint::Length(plan_lines));
        }
        constraints.push(Constraint::Min(1)); // chat
        constraints.push(Constraint::Length(1)); // status
        constraints.push(Constraint::Length(composer_lines.max(1) + 2)); // composer + border
        constraints.push(Constraint::Length(1)); // hints

        let chunks = Layout::default().direction(Direction::Vertical).constraints(constraints).split(area);

        let mut idx = 0;
        let session_card = chunks[idx];
        idx += 1;
        let plan = if plan_lines > 0 {
            let r = chunks[idx];
            idx += 1;
            Some(r)
        } else {
            None
        };
        let chat = chunks[idx];
        idx += 1;
        let status = chunks[idx];
        idx += 1;
        let composer = chunks[idx];
        idx += 1;
        let hints = chunks[idx];

        Self { session_card, plan, chat, status, composer, hints }
    }

    pub fn chat_inner_height(&self) -> u16 {
        self.chat.height
    }
}
