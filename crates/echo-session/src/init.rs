// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Coarse repository summary for `/init` (§1: "it does not do code analysis
//! of the user's workspace beyond producing a coarse repository summary for
//! `/init`"). No AST parsing, no per-file content analysis — just a
//! directory walk, an extension histogram, and manifest-file detection, in
//! the same spirit as `echo-tools`' `search` builtin's workspace walk.

use std::collections::BTreeMap;
use std::path::Path;

const SKIP_DIRS: &[&str] = &["target", "node_modules", ".git", "dist", "build", "vendor", ".venv"];
const MAX_ENTRIES: usize = 4000;

const MANIFESTS: &[(&str, &str)] = &[
    ("Cargo.toml", "Rust (cargo)"),
    ("package.json", "Node.js (npm/yarn/pnpm)"),
    ("go.mod", "Go"),
    ("pyproject.toml", "Python (pyproject)"),
    ("requirements.txt", "Python (pip)"),
    ("Gemfile", "Ruby (bundler)"),
    ("pom.xml", "Java (Maven)"),
    ("build.gradle", "Java/Kotlin (Gradle)"),
    ("CMakeLists.txt", "C/C++ (CMake)"),
];

struct Scan {
    top_level_dirs: Vec<String>,
    extension_counts: BTreeMap<String, usize>,
    manifests: Vec<&'static str>,
    total_files: usize,
    readme: Option<String>,
}

fn scan(root: &Path) -> Scan {
    let mut top_level_dirs = Vec::new();
    let mut extension_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut manifests = Vec::new();
    let mut total_files = 0usize;
    let mut readme = None;

    if let Ok(entries) = std::fs::read_dir(root) {
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') {
                continue;
            }
            if entry.path().is_dir() {
                top_level_dirs.push(name);
            } else if let Some((_, label)) = MANIFESTS.iter().find(|(file, _)| *file == name) {
                manifests.push(*label);
            } else if name.eq_ignore_ascii_case("README.md") || name.eq_ignore_ascii_case("README") {
                readme = std::fs::read_to_string(entry.path()).ok().map(|text| first_paragraph(&text));
            }
        }
    }
    top_level_dirs.sort();
    manifests.sort();
    manifests.dedup();

    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        if total_files >= MAX_ENTRIES {
            break;
        }
        let Ok(entries) = std::fs::read_dir(&dir) else { continue };
        for entry in entries.flatten() {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') || SKIP_DIRS.contains(&name.as_str()) {
                continue;
            }
            if path.is_dir() {
                stack.push(path);
            } else {
                total_files += 1;
                let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("(none)").to_string();
                *extension_counts.entry(ext).or_insert(0) += 1;
                if total_files >= MAX_ENTRIES {
                    break;
                }
            }
        }
    }

    Scan { top_level_dirs, extension_counts, manifests, total_files, readme }
}

fn first_paragraph(text: &str) -> String {
    text.lines()
        .find(|l| !l.trim().is_empty() && !l.trim_start().starts_with('#'))
        .unwrap_or("")
        .trim()
        .chars()
        .take(240)
        .collect()
}

/// Builds the markdown body `/init` writes into `AGENTS.md`. Pure function
/// over the filesystem scan so it's unit-testable without touching the real
/// `AGENTS.md` write path.
pub fn repo_summary(root: &Path) -> String {
    let scan = scan(root);
    let mut out = String::new();
    out.push_str("## Repository summary\n\n");
    out.push_str("Generated by `/init`: a coarse scan, not a code analysis.\n\n");

    if !scan.manifests.is_empty() {
        out.push_str(&format!("- Detected stack: {}\n", scan.manifests.join(", ")));
    }
    if !scan.top_level_dirs.is_empty() {
        out.push_str(&format!("- Top-level directories: {}\n", scan.top_level_dirs.join(", ")));
    }
    out.push_str(&format!("- {} files scanned\n", scan.total_files));

    let mut by_count: Vec<(&String, &usize)> = scan.extension_counts.iter().collect();
    by_count.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    if !by_count.is_empty() {
        out.push_str("- File types: ");
        let summary: Vec<String> = by_count.iter().take(8).map(|(ext, count)| format!(".{ext} x{count}")).collect();
        out.push_str(&summary.join(", "));
        out.push('\n');
    }

    if let Some(readme) = scan.readme {
        if !readme.is_empty() {
            out.push_str(&format!("- README: {readme}\n"));
        }
    }

    out
}

/// Writes (or appends) the repo summary into `<workdir>/AGENTS.md`. If the
/// file already has a `## Repository summary` section, it is replaced in
/// place rather than duplicated; otherwise the summary is appended.
pub fn write_agents_md(workdir: &Path) -> anyhow::Result<std::path::PathBuf> {
    let path = workdir.join("AGENTS.md");
    let summary = repo_summary(workdir);
    let existing = std::fs::read_to_string(&path).unwrap_or_default();

    let new_text = match existing.find("## Repository summary") {
        Some(start) => {
            let after = existing[start..].find("\n## ").map(|i| start + i);
            let end = after.unwrap_or(existing.len());
            format!("{}{}{}", &existing[..start], summary, &existing[end..])
        }
        None => {
            if existing.trim().is_empty() {
                summary
            } else {
                format!("{}\n\n{}", existing.trim_end(), summary)
            }
        }
    };

    std::fs::write(&path, new_text)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_rust_manifest_and_top_level_dirs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Cargo.toml"), "[package]").unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src").join("main.rs"), "fn main() {}").unwrap();
        let summary = repo_summary(dir.path());
        assert!(summary.contains("Rust (cargo)"));
        assert!(summary.contains("src"));
        assert!(summary.contains(".rs"));
    }

    #[test]
    fn skips_target_and_hidden_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("target").join("debug")).unwrap();
        std::fs::write(dir.path().join("target").join("debug").join("bin"), "").unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join(".git").join("HEAD"), "").unwrap();
        let summary = repo_summary(dir.path());
        assert!(summary.contains("0 files scanned"));
    }

    #[test]
    fn write_agents_md_creates_file_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_agents_md(dir.path()).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("## Repository summary"));
    }

    #[test]
    fn write_agents_md_replaces_existing_section_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("AGENTS.md");
        std::fs::write(&path, "# Project rules\n\nBe concise.\n\n## Repository summary\n\nstale\n\n## Another section\n\nkeep me\n").unwrap();
        write_agents_md(dir.path()).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("Be concise."));
        assert!(text.contains("## Another section"));
        assert!(text.contains("keep me"));
        assert!(!text.contains("stale"));
    }
}
