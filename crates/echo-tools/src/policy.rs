// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use regex::Regex;

/// Per-call approval policy (§4.3: `requires_approval` tool results gate on
/// this). The core treats sandbox/approval enforcement as out of scope
/// (§1 Non-goals) but the plumbing below exists end-to-end so a real policy
/// can be dropped in without touching the engine (§9 Open Questions).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalPolicy {
    /// Run without asking.
    Auto,
    /// Surface as `requires_approval` and wait for an `approval_decision`.
    Ask,
    /// Refuse outright; returns a `ToolResult{status: error}`.
    Deny,
}

/// Glob-pattern policy engine: maps a command string to an [`ApprovalPolicy`].
/// Deny patterns take priority over auto-approve patterns; anything matching
/// neither falls back to `Ask`.
#[derive(Debug, Clone, Default)]
pub struct ToolPolicy {
    auto_patterns: Vec<Regex>,
    deny_patterns: Vec<Regex>,
}

impl ToolPolicy {
    pub fn new(auto_patterns: &[String], deny_patterns: &[String]) -> Self {
        let compile = |patterns: &[String]| -> Vec<Regex> {
            patterns.iter().filter_map(|p| glob_to_regex(p)).collect()
        };
        Self { auto_patterns: compile(auto_patterns), deny_patterns: compile(deny_patterns) }
    }

    pub fn decide(&self, command: &str) -> ApprovalPolicy {
        if self.deny_patterns.iter().any(|re| re.is_match(command)) {
            return ApprovalPolicy::Deny;
        }
        if self.auto_patterns.iter().any(|re| re.is_match(command)) {
            return ApprovalPolicy::Auto;
        }
        ApprovalPolicy::Ask
    }
}

/// Converts a simple shell glob (`*` / `?` only) into an anchored [`Regex`].
fn glob_to_regex(pattern: &str) -> Option<Regex> {
    let mut re = String::from("^");
    for ch in pattern.chars() {
        match ch {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            c => re.push_str(&regex::escape(&c.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deny_beats_auto_for_same_pattern() {
        let p = ToolPolicy::new(&["rm *".into()], &["rm *".into()]);
        assert_eq!(p.decide("rm /tmp/foo"), ApprovalPolicy::Deny);
    }

    #[test]
    fn auto_approve_wildcard_prefix() {
        let p = ToolPolicy::new(&["cat *".into()], &[]);
        assert_eq!(p.decide("cat /etc/hosts"), ApprovalPolicy::Auto);
    }

    #[test]
    fn unmatched_command_falls_back_to_ask() {
        let p = ToolPolicy::new(&["cat *".into()], &["rm -rf /*".into()]);
        assert_eq!(p.decide("git commit -m test"), ApprovalPolicy::Ask);
    }

    #[test]
    fn empty_patterns_always_ask() {
        let p = ToolPolicy::default();
        assert_eq!(p.decide("anything"), ApprovalPolicy::Ask);
    }
}
