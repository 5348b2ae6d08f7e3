// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::fmt;

/// Everything that used to be persisted YAML in the full schema and is now
/// an in-memory default, overridable via `-c key=value` (§9 Open Questions).
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub model: String,
    pub default_mode: AgentMode,
    pub max_tool_rounds: u32,
    pub compaction_threshold: f32,
    pub compaction_keep_recent: usize,
    pub tool_timeout_interactive_secs: u64,
    pub tool_timeout_exec_secs: u64,
    pub request_timeout_secs: u64,
    pub retries: u32,
    pub sq_capacity: usize,
    pub eq_subscriber_buffer: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4".to_string(),
            default_mode: AgentMode::Agent,
            max_tool_rounds: 50,
            compaction_threshold: 0.85,
            compaction_keep_recent: 6,
            tool_timeout_interactive_secs: 600,
            tool_timeout_exec_secs: 120,
            request_timeout_secs: 120,
            retries: 2,
            sq_capacity: echo_queue_defaults::SQ_CAPACITY,
            eq_subscriber_buffer: echo_queue_defaults::EQ_BUFFER,
        }
    }
}

/// Mirrors `echo-queue`'s defaults without introducing a dependency cycle
/// (config is consumed by echo-queue's callers, not the reverse).
mod echo_queue_defaults {
    pub const SQ_CAPACITY: usize = 64;
    pub const EQ_BUFFER: usize = 128;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentMode {
    Research,
    Plan,
    Agent,
}

impl fmt::Display for AgentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AgentMode::Research => "research",
            AgentMode::Plan => "plan",
            AgentMode::Agent => "agent",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for AgentMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "research" => Ok(AgentMode::Research),
            "plan" => Ok(AgentMode::Plan),
            "agent" => Ok(AgentMode::Agent),
            other => Err(format!("unknown agent mode '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_runtime_config_has_sane_limits() {
        let c = RuntimeConfig::default();
        assert!(c.max_tool_rounds > 0);
        assert!(c.compaction_threshold > 0.0 && c.compaction_threshold < 1.0);
    }

    #[test]
    fn agent_mode_display_and_parse_round_trip() {
        for m in [AgentMode::Research, AgentMode::Plan, AgentMode::Agent] {
            let s = m.to_string();
            let parsed: AgentMode = s.parse().unwrap();
            assert_eq!(parsed, m);
        }
    }
}
