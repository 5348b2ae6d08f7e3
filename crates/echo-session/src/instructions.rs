// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::{Path, PathBuf};

/// Discovers `AGENTS.md` / `AGENTS.override.md` up the directory tree from
/// `start` to the filesystem root, plus the global `~/.echo/AGENTS.md`
/// (§6). An override file replaces the non-override file at the same
/// level; concatenation is top-down (root-most directory first) so more
/// specific instructions read as refinements of broader ones.
pub fn discover(start: &Path, echo_home: &Path) -> Vec<String> {
    let mut levels: Vec<PathBuf> = Vec::new();
    let mut dir = Some(start.to_path_buf());
    while let Some(d) = dir {
        levels.push(d.clone());
        dir = d.parent().map(|p| p.to_path_buf());
    }
    levels.reverse();

    let mut texts = Vec::new();

    let global = echo_home.join("AGENTS.md");
    if let Some(text) = read_file(&global) {
        texts.push(text);
    }

    for level in levels {
        let override_path = level.join("AGENTS.override.md");
        let plain_path = level.join("AGENTS.md");
        if let Some(text) = read_file(&override_path) {
            texts.push(text);
        } else if let Some(text) = read_file(&plain_path) {
            texts.push(text);
        }
    }

    texts
}

fn read_file(path: &Path) -> Option<String> {
    std::fs::read_to_string(path).ok().filter(|s| !s.trim().is_empty())
}
