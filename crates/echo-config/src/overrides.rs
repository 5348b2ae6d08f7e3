// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use crate::runtime::{AgentMode, RuntimeConfig};

/// Applies repeated `-c key=value` CLI flags onto a [`RuntimeConfig`].
///
/// Unknown keys are warned about and otherwise ignored — a typo in `-c`
/// should not be fatal to an otherwise-valid invocation (§7: configuration
/// errors that prevent startup are the only fatal ones; an unrecognised
/// override is not one of them).
pub fn apply_overrides(config: &mut RuntimeConfig, overrides: &[(String, String)]) {
    for (key, value) in overrides {
        match key.as_str() {
            "model" | "model.name" => config.model = value.clone(),
            "agent.default_mode" => match value.parse::<AgentMode>() {
                Ok(mode) => config.default_mode = mode,
                Err(e) => tracing::warn!(key, value, error = %e, "invalid -c override"),
            },
            "agent.max_tool_rounds" => match value.parse() {
                Ok(n) => config.max_tool_rounds = n,
                Err(_) => tracing::warn!(key, value, "invalid -c override: not an integer"),
            },
            "agent.compaction_threshold" => match value.parse() {
                Ok(n) => config.compaction_threshold = n,
                Err(_) => tracing::warn!(key, value, "invalid -c override: not a float"),
            },
            "agent.compaction_keep_recent" => match value.parse() {
                Ok(n) => config.compaction_keep_recent = n,
                Err(_) => tracing::warn!(key, value, "invalid -c override: not an integer"),
            },
            "tool.timeout_interactive_secs" => match value.parse() {
                Ok(n) => config.tool_timeout_interactive_secs = n,
                Err(_) => tracing::warn!(key, value, "invalid -c override: not an integer"),
            },
            "tool.timeout_exec_secs" => match value.parse() {
                Ok(n) => config.tool_timeout_exec_secs = n,
                Err(_) => tracing::warn!(key, value, "invalid -c override: not an integer"),
            },
            "request.timeout_secs" => match value.parse() {
                Ok(n) => config.request_timeout_secs = n,
                Err(_) => tracing::warn!(key, value, "invalid -c override: not an integer"),
            },
            "request.retries" => match value.parse() {
                Ok(n) => config.retries = n,
                Err(_) => tracing::warn!(key, value, "invalid -c override: not an integer"),
            },
            other => tracing::warn!(key = other, "unknown -c override, ignoring"),
        }
    }
}

/// Parses a `-c key=value` flag value into a `(key, value)` pair.
pub fn parse_kv(raw: &str) -> anyhow::Result<(String, String)> {
    let (k, v) = raw
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("-c override '{raw}' is not in key=value form"))?;
    Ok((k.to_string(), v.to_string()))
}
