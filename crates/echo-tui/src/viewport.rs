// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Diff-aware conversation viewport (§4.7).
//!
//! Wraps a plain list of wrapped lines and tracks a scroll offset that is
//! either a fixed line count or "stuck to the bottom" (`usize::MAX`
//! sentinel — see the teacher's `sven-tui::pager::PagerOverlay`). `set_lines`
//! never re-renders more than it has to: unchanged input is a no-op, a
//! pure append while stuck to the bottom only returns the new tail,
//! anything else is a full resync.

const STUCK_TO_BOTTOM: usize = usize::MAX;

/// What a mutation to the viewport requires the caller to redraw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewportSync {
    /// Nothing changed; skip the redraw entirely.
    Unchanged,
    /// Only these lines were appended; scroll them into view.
    Append { tail: Vec<String> },
    /// Redraw the whole visible region.
    Full,
}

pub struct DiffAwareViewport {
    lines: Vec<String>,
    scroll_offset: usize,
    width: u16,
    height: u16,
}

impl DiffAwareViewport {
    pub fn new(width: u16, height: u16) -> Self {
        Self { lines: Vec::new(), scroll_offset: STUCK_TO_BOTTOM, width, height }
    }

    pub fn is_stuck_to_bottom(&self) -> bool {
        self.scroll_offset == STUCK_TO_BOTTOM
    }

    /// Replaces the full line buffer, diffing against the previous content
    /// (§4.7, §8 property 8).
    pub fn set_lines(&mut self, lines: Vec<String>) -> ViewportSync {
        if lines == self.lines {
            return ViewportSync::Unchanged;
        }
        let is_prefix_extension = lines.len() > self.lines.len() && lines[..self.lines.len()] == self.lines[..];
        if is_prefix_extension && self.is_stuck_to_bottom() {
            let tail = lines[self.lines.len()..].to_vec();
            self.lines = lines;
            return ViewportSync::Append { tail };
        }
        self.lines = lines;
        ViewportSync::Full
    }

    /// Invalidates the cached content on a width change and forces a full
    /// resync; a height-only change keeps content but still resyncs so the
    /// visible window is recomputed (§4.7).
    pub fn resize(&mut self, width: u16, height: u16) -> ViewportSync {
        let width_changed = width != self.width;
        self.width = width;
        self.height = height;
        if width_changed {
            self.lines.clear();
        }
        ViewportSync::Full
    }

    fn clamped_offset(&self) -> usize {
        let visible = self.height.max(1) as usize;
        let total = self.lines.len();
        if total <= visible {
            return 0;
        }
        let max_offset = total - visible;
        if self.scroll_offset == STUCK_TO_BOTTOM {
            max_offset
        } else {
            self.scroll_offset.min(max_offset)
        }
    }

    pub fn visible_lines(&self) -> &[String] {
        let visible = self.height.max(1) as usize;
        let offset = self.clamped_offset();
        let end = (offset + visible).min(self.lines.len());
        &self.lines[offset..end]
    }

    pub fn scroll_percent(&self) -> u8 {
        let visible = self.height.max(1) as usize;
        let total = self.lines.len();
        if total <= visible {
            return 100;
        }
        let max_offset = total - visible;
        let offset = self.clamped_offset();
        ((offset as f64 / max_offset as f64) * 100.0).round() as u8
    }

    fn scroll_to(&mut self, offset: usize) -> ViewportSync {
        let visible = self.height.max(1) as usize;
        let max_offset = self.lines.len().saturating_sub(visible);
        self.scroll_offset = if offset >= max_offset { STUCK_TO_BOTTOM } else { offset };
        ViewportSync::Full
    }

    pub fn line_up(&mut self, n: usize) -> ViewportSync {
        let current = self.clamped_offset();
        self.scroll_to(current.saturating_sub(n))
    }

    pub fn line_down(&mut self, n: usize) -> ViewportSync {
        let current = self.clamped_offset();
        self.scroll_to(current.saturating_add(n))
    }

    pub fn page_up(&mut self) -> ViewportSync {
        self.line_up(self.height.max(1) as usize)
    }

    pub fn page_down(&mut self) -> ViewportSync {
        self.line_down(self.height.max(1) as usize)
    }

    pub fn home(&mut self) -> ViewportSync {
        self.scroll_to(0)
    }

    pub fn end(&mut self) -> ViewportSync {
        self.scroll_offset = STUCK_TO_BOTTOM;
        ViewportSync::Full
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn seed_scenario_append_while_stuck_to_bottom() {
        let mut vp = DiffAwareViewport::new(80, 24);
        assert_eq!(vp.set_lines(lines(&["a", "b"])), ViewportSync::Full);
        let sync = vp.set_lines(lines(&["a", "b", "c"]));
        assert_eq!(sync, ViewportSync::Append { tail: vec!["c".to_string()] });
    }

    #[test]
    fn seed_scenario_unrelated_replacement_is_a_full_sync() {
        let mut vp = DiffAwareViewport::new(80, 24);
        vp.set_lines(lines(&["a", "b"]));
        let sync = vp.set_lines(lines(&["x", "y"]));
        assert_eq!(sync, ViewportSync::Full);
    }

    #[test]
    fn seed_scenario_identical_lines_produce_no_output() {
        let mut vp = DiffAwareViewport::new(80, 24);
        vp.set_lines(lines(&["a", "b"]));
        let sync = vp.set_lines(lines(&["a", "b"]));
        assert_eq!(sync, ViewportSync::Unchanged);
    }

    #[test]
    fn append_while_scrolled_away_is_a_full_sync_not_an_append() {
        let mut vp = DiffAwareViewport::new(80, 2);
        vp.set_lines(lines(&["a", "b", "c", "d"]));
        vp.home();
        let sync = vp.set_lines(lines(&["a", "b", "c", "d", "e"]));
        assert_eq!(sync, ViewportSync::Full);
    }

    #[test]
    fn resize_width_change_forces_full_resync_and_clears_cache() {
        let mut vp = DiffAwareViewport::new(80, 24);
        vp.set_lines(lines(&["a", "b"]));
        vp.resize(40, 24);
        assert!(vp.lines.is_empty());
    }

    #[test]
    fn end_restores_stick_to_bottom() {
        let mut vp = DiffAwareViewport::new(80, 2);
        vp.set_lines(lines(&["a", "b", "c", "d"]));
        vp.home();
        assert!(!vp.is_stuck_to_bottom());
        vp.end();
        assert!(vp.is_stuck_to_bottom());
    }

    #[test]
    fn scroll_percent_is_100_when_everything_fits() {
        let mut vp = DiffAwareViewport::new(80, 24);
        vp.set_lines(lines(&["a", "b"]));
        assert_eq!(vp.scroll_percent(), 100);
    }
}
