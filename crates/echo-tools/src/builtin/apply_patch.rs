// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use echo_types::{ToolCall, ToolKind, ToolResult};

use crate::policy::ApprovalPolicy;
use crate::tool::{ProgressSink, ToolHandler};

/// Applies a unified-diff-style patch relative to the workspace (§4.4).
///
/// Patch format:
/// ```text
/// *** Begin Patch
/// *** Add File: path/to/new_file.rs
/// +content line 1
/// *** Delete File: path/to/old_file.rs
/// *** Update File: path/to/existing.rs
/// @@ context_line
///  context line (space prefix)
/// -removed line
/// +added line
/// *** End Patch
/// ```
pub struct ApplyPatchHandler {
    pub workdir: std::path::PathBuf,
}

impl ApplyPatchHandler {
    pub fn new(workdir: impl Into<std::path::PathBuf>) -> Self {
        Self { workdir: workdir.into() }
    }
}

#[async_trait]
impl ToolHandler for ApplyPatchHandler {
    fn default_policy(&self) -> ApprovalPolicy {
        ApprovalPolicy::Ask
    }

    async fn execute(&self, call: &ToolCall, _progress: &dyn ProgressSink) -> anyhow::Result<ToolResult> {
        let patch = call
            .patch
            .clone()
            .or_else(|| call.diff.clone())
            .ok_or_else(|| anyhow::anyhow!("missing 'patch'"))?;

        match apply_patch(&self.workdir, &patch).await {
            Ok(summary) => Ok(ToolResult {
                id: call.id.clone(),
                kind: ToolKind::ApplyPatch,
                status: echo_types::ToolStatus::Completed,
                output: Some(summary),
                error: None,
                exit_code: None,
                command: None,
                path: None,
                diff: Some(patch),
                approval_id: None,
                approval_reason: None,
            }),
            Err(e) => Ok(ToolResult::err(&call.id, ToolKind::ApplyPatch, e.to_string())),
        }
    }
}

async fn apply_patch(workdir: &std::path::Path, input: &str) -> anyhow::Result<String> {
    let begin = "*** Begin Patch";
    let end = "*** End Patch";
    let start = input.find(begin).ok_or_else(|| anyhow::anyhow!("'*** Begin Patch' not found"))?;
    let finish = input.find(end).ok_or_else(|| anyhow::anyhow!("'*** End Patch' not found"))?;
    if finish <= start {
        anyhow::bail!("'*** End Patch' appears before '*** Begin Patch'");
    }

    let body = &input[start + begin.len()..finish];
    let mut summary = Vec::new();
    let mut remaining = body;

    while !remaining.trim().is_empty() {
        remaining = remaining.trim_start_matches('\n');

        if let Some(rest) = remaining.strip_prefix("*** Add File: ") {
            let (path, rest) = take_line(rest);
            let (content, rest2) = collect_add_content(rest);
            let full = resolve(workdir, &path);
            if let Some(parent) = full.parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }
            tokio::fs::write(&full, &content).await?;
            summary.push(format!("A {path}"));
            remaining = rest2;
        } else if let Some(rest) = remaining.strip_prefix("*** Delete File: ") {
            let (path, rest) = take_line(rest);
            let full = resolve(workdir, &path);
            if tokio::fs::metadata(&full).await.is_ok() {
                tokio::fs::remove_file(&full).await?;
            }
            summary.push(format!("D {path}"));
            remaining = rest;
        } else if let Some(rest) = remaining.strip_prefix("*** Update File: ") {
            let (path, rest) = take_line(rest);
            let (hunks, rest2) = collect_hunks(rest);
            let full = resolve(workdir, &path);
            let file_content = tokio::fs::read_to_string(&full)
                .await
                .map_err(|e| anyhow::anyhow!("cannot read {path}: {e}"))?;
            let new_content = apply_hunks(&file_content, &hunks)
                .map_err(|e| anyhow::anyhow!("hunk failed for {path}: {e}"))?;
            tokio::fs::write(&full, &new_content).await?;
            summary.push(format!("M {path}"));
            remaining = rest2;
        } else {
            let next = remaining.find('\n').unwrap_or(remaining.len());
            remaining = &remaining[next..];
        }
    }

    if summary.is_empty() {
        Ok("(no changes applied)".to_string())
    } else {
        Ok(summary.join("\n"))
    }
}

fn resolve(workdir: &std::path::Path, path: &str) -> std::path::PathBuf {
    let p = std::path::Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        workdir.join(p)
    }
}

fn take_line(s: &str) -> (String, &str) {
    let newline = s.find('\n').unwrap_or(s.len());
    (s[..newline].trim().to_string(), &s[newline..])
}

fn collect_add_content(s: &str) -> (String, &str) {
    let mut lines = Vec::new();
    let mut remaining = s;
    loop {
        remaining = remaining.strip_prefix('\n').unwrap_or(remaining);
        if remaining.starts_with("*** ") || remaining.is_empty() {
            break;
        }
        let newline = remaining.find('\n').unwrap_or(remaining.len());
        let line = &remaining[..newline];
        lines.push(line.strip_prefix('+').unwrap_or(line).to_string());
        remaining = &remaining[newline..];
    }
    let content = lines.join("\n");
    let content = if content.ends_with('\n') { content } else { format!("{content}\n") };
    (content, remaining)
}

struct Hunk {
    context_before: Vec<String>,
    changes: Vec<(char, String)>,
}

fn collect_hunks(s: &str) -> (Vec<Hunk>, &str) {
    let mut hunks = Vec::new();
    let mut remaining = s;
    loop {
        remaining = remaining.strip_prefix('\n').unwrap_or(remaining);
        if remaining.starts_with("*** ") || remaining.is_empty() {
            break;
        }
        if let Some(rest) = remaining.strip_prefix("@@ ") {
            let newline = rest.find('\n').unwrap_or(rest.len());
            let header = rest[..newline].trim().to_string();
            remaining = &rest[newline..];
            let mut context_before = Vec::new();
            if !header.is_empty() {
                context_before.push(header);
            }
            let mut changes = Vec::new();
            loop {
                remaining = remaining.strip_prefix('\n').unwrap_or(remaining);
                if remaining.starts_with("@@ ") || remaining.starts_with("*** ") || remaining.is_empty() {
                    break;
                }
                let newline = remaining.find('\n').unwrap_or(remaining.len());
                let line = &remaining[..newline];
                if let Some(r) = line.strip_prefix('+') {
                    changes.push(('+', r.to_string()));
                } else if let Some(r) = line.strip_prefix('-') {
                    changes.push(('-', r.to_string()));
                } else if let Some(r) = line.strip_prefix(' ') {
                    changes.push((' ', r.to_string()));
                }
                remaining = &remaining[newline..];
            }
            hunks.push(Hunk { context_before, changes });
        } else {
            let newline = remaining.find('\n').unwrap_or(remaining.len());
            remaining = &remaining[newline..];
        }
    }
    (hunks, remaining)
}

fn apply_hunks(content: &str, hunks: &[Hunk]) -> anyhow::Result<String> {
    let mut lines: Vec<String> = content.lines().map(str::to_string).collect();
    let had_trailing_newline = content.ends_with('\n');

    for hunk in hunks {
        let search_ctx: Vec<&str> = hunk.context_before.iter().map(String::as_str).collect();
        let expected: Vec<&str> = hunk
            .changes
            .iter()
            .filter(|(c, _)| *c == '-' || *c == ' ')
            .map(|(_, l)| l.as_str())
            .collect();

        let start_pos = find_hunk_position(&lines, &search_ctx, &expected)
            .ok_or_else(|| anyhow::anyhow!("could not find hunk context in file"))?;

        let mut new_section = Vec::new();
        let mut i = start_pos;
        for (ch, line) in &hunk.changes {
            match ch {
                ' ' => {
                    i += 1;
                    new_section.push(line.clone());
                }
                '-' => i += 1,
                '+' => new_section.push(line.clone()),
                _ => {}
            }
        }
        lines.splice(start_pos..i, new_section);
    }

    let mut result = lines.join("\n");
    if had_trailing_newline {
        result.push('\n');
    }
    Ok(result)
}

fn find_hunk_position(lines: &[String], context: &[&str], expected: &[&str]) -> Option<usize> {
    let search = if !context.is_empty() {
        for (i, line) in lines.iter().enumerate() {
            if line.trim() == context[0].trim() && lines_match_at(lines, i, expected) {
                return Some(i);
            }
        }
        return None;
    } else {
        expected
    };
    (0..=lines.len().saturating_sub(search.len())).find(|&i| lines_match_at(lines, i, search))
}

fn lines_match_at(lines: &[String], start: usize, expected: &[&str]) -> bool {
    if start + expected.len() > lines.len() {
        return false;
    }
    expected.iter().enumerate().all(|(i, exp)| lines[start + i].trim() == exp.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::NoopProgressSink;

    #[tokio::test]
    async fn adds_a_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let handler = ApplyPatchHandler::new(dir.path());
        let mut call = ToolCall::new("1", ToolKind::ApplyPatch);
        call.patch = Some(
            "*** Begin Patch\n*** Add File: hello.txt\n+hi there\n*** End Patch".to_string(),
        );
        let result = handler.execute(&call, &NoopProgressSink).await.unwrap();
        assert_eq!(result.status, echo_types::ToolStatus::Completed);
        assert_eq!(std::fs::read_to_string(dir.path().join("hello.txt")).unwrap(), "hi there\n");
    }

    #[tokio::test]
    async fn updates_existing_file_via_hunk() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("f.txt"), "line1\nline2\nline3\n").unwrap();
        let handler = ApplyPatchHandler::new(dir.path());
        let mut call = ToolCall::new("1", ToolKind::ApplyPatch);
        call.patch = Some(
            "*** Begin Patch\n*** Update File: f.txt\n@@ line1\n line1\n-line2\n+changed\n line3\n*** End Patch"
                .to_string(),
        );
        let result = handler.execute(&call, &NoopProgressSink).await.unwrap();
        assert_eq!(result.status, echo_types::ToolStatus::Completed);
        assert_eq!(std::fs::read_to_string(dir.path().join("f.txt")).unwrap(), "line1\nchanged\nline3\n");
    }

    #[tokio::test]
    async fn deletes_a_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("gone.txt"), "bye").unwrap();
        let handler = ApplyPatchHandler::new(dir.path());
        let mut call = ToolCall::new("1", ToolKind::ApplyPatch);
        call.patch = Some("*** Begin Patch\n*** Delete File: gone.txt\n*** End Patch".to_string());
        handler.execute(&call, &NoopProgressSink).await.unwrap();
        assert!(!dir.path().join("gone.txt").exists());
    }

    #[tokio::test]
    async fn malformed_patch_reports_error_status() {
        let dir = tempfile::tempdir().unwrap();
        let handler = ApplyPatchHandler::new(dir.path());
        let mut call = ToolCall::new("1", ToolKind::ApplyPatch);
        call.patch = Some("not a patch".to_string());
        let result = handler.execute(&call, &NoopProgressSink).await.unwrap();
        assert_eq!(result.status, echo_types::ToolStatus::Error);
    }
}
