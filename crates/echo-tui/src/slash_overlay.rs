// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Slash popup overlay (§4.7, §4.9): thin state around [`SlashMachine`]
//! that tracks which catalog entries currently match the composer's first
//! line, for the popup list to render.

use echo_render::{fuzzy_match, parse, CatalogEntry, ParsedCommand, SlashAction, SlashMachine};

pub struct SlashOverlay {
    machine: SlashMachine,
}

impl Default for SlashOverlay {
    fn default() -> Self {
        Self::new()
    }
}

impl SlashOverlay {
    pub fn new() -> Self {
        Self { machine: SlashMachine::default() }
    }

    pub fn with_catalog(catalog: Vec<CatalogEntry>) -> Self {
        Self { machine: SlashMachine::new(catalog) }
    }

    /// Whether the first line of the composer currently opens the popup.
    pub fn is_active(&self, first_line: &str) -> bool {
        matches!(parse(first_line), ParsedCommand::PartialCommand { .. } | ParsedCommand::CompletingArgs { .. })
    }

    /// The catalog entries to show in the popup for the current input.
    pub fn matches(&self, first_line: &str) -> Vec<&CatalogEntry> {
        match parse(first_line) {
            ParsedCommand::PartialCommand { partial } => fuzzy_match(&partial, self.machine.catalog()),
            _ => Vec::new(),
        }
    }

    pub fn on_tab(&self, first_line: &str) -> SlashAction {
        self.machine.on_tab(first_line)
    }

    pub fn on_enter(&self, first_line: &str) -> SlashAction {
        self.machine.on_enter(first_line)
    }

    pub fn on_esc(&self) -> SlashAction {
        self.machine.on_esc()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slash_alone_is_active_with_no_matches_narrowed() {
        let overlay = SlashOverlay::new();
        assert!(overlay.is_active("/"));
        assert!(!overlay.matches("/").is_empty());
    }

    #[test]
    fn plain_text_does_not_activate_the_popup() {
        let overlay = SlashOverlay::new();
        assert!(!overlay.is_active("hello there"));
    }

    #[test]
    fn narrowing_the_partial_narrows_the_match_list() {
        let overlay = SlashOverlay::new();
        let all = overlay.matches("/");
        let narrowed = overlay.matches("/mod");
        assert!(narrowed.len() <= all.len());
        assert!(narrowed.iter().any(|e| e.name == "model"));
    }
}
