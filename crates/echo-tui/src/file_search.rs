// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! `@`-triggered fuzzy file search overlay (§4.7).
//!
//! Walks the working directory once per keystroke-free idle tick (the
//! caller decides when to refresh), skipping common noise directories, and
//! scores candidates the same way the slash popup does: exact > prefix >
//! substring.

use std::path::{Path, PathBuf};

const SKIP_DIRS: &[&str] = &[".git", "target", "node_modules", ".echo"];
const MAX_RESULTS: usize = 200;

pub fn collect_files(root: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    walk(root, root, &mut out);
    out
}

fn walk(root: &Path, dir: &Path, out: &mut Vec<PathBuf>) {
    if out.len() >= MAX_RESULTS {
        return;
    }
    let Ok(entries) = std::fs::read_dir(dir) else { return };
    for entry in entries.flatten() {
        if out.len() >= MAX_RESULTS {
            return;
        }
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with('.') || SKIP_DIRS.contains(&name.as_ref()) {
            continue;
        }
        if path.is_dir() {
            walk(root, &path, out);
        } else if let Ok(rel) = path.strip_prefix(root) {
            out.push(rel.to_path_buf());
        }
    }
}

fn score(query: &str, candidate: &str) -> i32 {
    if candidate == query {
        100
    } else if candidate.starts_with(query) {
        80
    } else if candidate.contains(query) {
        40
    } else {
        0
    }
}

/// Scores and sorts `files` against `query` (case-insensitive substring on
/// the path's string form), dropping non-matches.
pub fn fuzzy_files<'a>(query: &str, files: &'a [PathBuf]) -> Vec<&'a PathBuf> {
    let query = query.to_lowercase();
    let mut scored: Vec<(&PathBuf, i32)> = files
        .iter()
        .filter_map(|f| {
            let candidate = f.to_string_lossy().to_lowercase();
            let s = score(&query, &candidate);
            (s > 0 || query.is_empty()).then_some((f, s))
        })
        .collect();
    scored.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    scored.into_iter().map(|(f, _)| f).collect()
}

pub struct FileSearch {
    files: Vec<PathBuf>,
}

impl FileSearch {
    pub fn new(root: &Path) -> Self {
        Self { files: collect_files(root) }
    }

    pub fn refresh(&mut self, root: &Path) {
        self.files = collect_files(root);
    }

    pub fn search(&self, query: &str) -> Vec<&PathBuf> {
        fuzzy_files(query, &self.files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn walk_finds_nested_files_and_skips_git() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::create_dir_all(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join("src/main.rs"), "").unwrap();
        fs::write(dir.path().join(".git/HEAD"), "").unwrap();
        let files = collect_files(dir.path());
        assert!(files.iter().any(|f| f.ends_with("src/main.rs")));
        assert!(!files.iter().any(|f| f.to_string_lossy().contains(".git")));
    }

    #[test]
    fn fuzzy_files_prefers_prefix_match() {
        let files = vec![PathBuf::from("src/main.rs"), PathBuf::from("src/app.rs")];
        let result = fuzzy_files("src/app", &files);
        assert_eq!(result[0], &PathBuf::from("src/app.rs"));
    }
}
