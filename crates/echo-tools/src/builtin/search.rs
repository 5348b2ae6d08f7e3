// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use echo_types::{ToolCall, ToolKind, ToolResult};

use crate::policy::ApprovalPolicy;
use crate::tool::{ProgressSink, ToolHandler};

/// Runs a workspace file search by glob/substring pattern; `output` carries
/// a newline-separated list of matching relative paths (§4.4).
pub struct SearchHandler {
    pub workdir: std::path::PathBuf,
    pub max_results: usize,
}

impl SearchHandler {
    pub fn new(workdir: impl Into<std::path::PathBuf>) -> Self {
        Self { workdir: workdir.into(), max_results: 200 }
    }
}

#[async_trait]
impl ToolHandler for SearchHandler {
    fn default_policy(&self) -> ApprovalPolicy {
        ApprovalPolicy::Auto
    }

    async fn execute(&self, call: &ToolCall, _progress: &dyn ProgressSink) -> anyhow::Result<ToolResult> {
        let pattern = call
            .args
            .get("pattern")
            .and_then(|v| v.as_str())
            .or(call.path.as_deref())
            .ok_or_else(|| anyhow::anyhow!("missing search pattern"))?
            .to_string();

        let workdir = self.workdir.clone();
        let max = self.max_results;
        let pattern_clone = pattern.clone();
        let matches = tokio::task::spawn_blocking(move || walk(&workdir, &pattern_clone, max)).await?;

        Ok(ToolResult::ok(&call.id, ToolKind::Search, matches.join("\n")))
    }
}

fn walk(root: &std::path::Path, pattern: &str, max: usize) -> Vec<String> {
    let mut matches = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        if matches.len() >= max {
            break;
        }
        let Ok(entries) = std::fs::read_dir(&dir) else { continue };
        for entry in entries.flatten() {
            let path = entry.path();
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with('.') || name == "target" || name == "node_modules" {
                continue;
            }
            if path.is_dir() {
                stack.push(path);
            } else if glob_match(pattern, &name) || name.contains(pattern) {
                if let Ok(rel) = path.strip_prefix(root) {
                    matches.push(rel.to_string_lossy().to_string());
                }
                if matches.len() >= max {
                    break;
                }
            }
        }
    }
    matches.sort();
    matches
}

/// `*` (anything) and `?` (one char) glob matching, case-sensitive.
fn glob_match(pattern: &str, name: &str) -> bool {
    fn helper(p: &[u8], n: &[u8]) -> bool {
        match (p.first(), n.first()) {
            (None, None) => true,
            (Some(b'*'), _) => helper(&p[1..], n) || (!n.is_empty() && helper(p, &n[1..])),
            (Some(b'?'), Some(_)) => helper(&p[1..], &n[1..]),
            (Some(pc), Some(nc)) if pc == nc => helper(&p[1..], &n[1..]),
            _ => false,
        }
    }
    helper(pattern.as_bytes(), name.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::NoopProgressSink;
    use serde_json::json;

    #[tokio::test]
    async fn finds_file_by_glob() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("main.rs"), "").unwrap();
        std::fs::write(dir.path().join("lib.rs"), "").unwrap();
        std::fs::write(dir.path().join("readme.md"), "").unwrap();
        let handler = SearchHandler::new(dir.path());
        let mut call = ToolCall::new("1", ToolKind::Search);
        call.args = json!({ "pattern": "*.rs" });
        let result = handler.execute(&call, &NoopProgressSink).await.unwrap();
        let out = result.output.unwrap();
        assert!(out.contains("main.rs"));
        assert!(out.contains("lib.rs"));
        assert!(!out.contains("readme.md"));
    }

    #[test]
    fn glob_match_question_mark_matches_one_char() {
        assert!(glob_match("a?c", "abc"));
        assert!(!glob_match("a?c", "abbc"));
    }

    #[test]
    fn glob_match_star_matches_any_run() {
        assert!(glob_match("*.rs", "lib.rs"));
        assert!(!glob_match("*.rs", "lib.md"));
    }
}
