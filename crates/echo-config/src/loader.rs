// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::schema::PersistedConfig;

/// `~/.echo`, honouring `$ECHO_HOME` for tests and containerised installs.
pub fn echo_home() -> anyhow::Result<PathBuf> {
    if let Ok(dir) = std::env::var("ECHO_HOME") {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|h| h.join(".echo"))
        .context("could not determine home directory")
}

/// Resolves the config file path: `$ECHO_CONFIG` (mirroring `--config`) or
/// the default `~/.echo/config.toml`.
pub fn config_path(explicit: Option<&Path>) -> anyhow::Result<PathBuf> {
    if let Some(p) = explicit {
        return Ok(p.to_path_buf());
    }
    if let Ok(p) = std::env::var("ECHO_CONFIG") {
        return Ok(PathBuf::from(p));
    }
    Ok(echo_home()?.join("config.toml"))
}

/// Loads the persisted config, applying env var overrides for url/token
/// (§6: `ANTHROPIC_BASE_URL`, `ANTHROPIC_AUTH_TOKEN`, legacy `OPENAI_API_KEY`).
/// Missing file is not an error — readers tolerate it (§5).
pub fn load(explicit_path: Option<&Path>) -> anyhow::Result<PersistedConfig> {
    let path = config_path(explicit_path)?;
    let mut config = if path.exists() {
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing config file {}", path.display()))?
    } else {
        PersistedConfig::default()
    };

    if let Ok(url) = std::env::var("ANTHROPIC_BASE_URL") {
        config.url = Some(url);
    }
    if let Ok(token) = std::env::var("ANTHROPIC_AUTH_TOKEN") {
        config.token = Some(token);
    } else if let Ok(key) = std::env::var("OPENAI_API_KEY") {
        config.token = Some(key);
    }

    Ok(config)
}

/// Writes the config file atomically (write to a sibling temp file, then
/// rename) so readers never observe a partially-written file (§5).
pub fn save(config: &PersistedConfig, explicit_path: Option<&Path>) -> anyhow::Result<()> {
    let path = config_path(explicit_path)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating config directory {}", parent.display()))?;
    }
    let text = toml::to_string_pretty(config)?;
    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, text)
        .with_context(|| format!("writing temp config file {}", tmp_path.display()))?;
    std::fs::rename(&tmp_path, &path)
        .with_context(|| format!("renaming temp config file into place at {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn missing_config_file_loads_as_default() {
        let _guard = ENV_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        std::env::remove_var("ANTHROPIC_BASE_URL");
        std::env::remove_var("ANTHROPIC_AUTH_TOKEN");
        std::env::remove_var("OPENAI_API_KEY");
        let explicit = dir.path().join("does-not-exist.toml");
        let c = load(Some(&explicit)).unwrap();
        assert!(c.url.is_none());
        assert!(c.token.is_none());
    }

    #[test]
    fn save_then_load_round_trips() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var("ANTHROPIC_BASE_URL");
        std::env::remove_var("ANTHROPIC_AUTH_TOKEN");
        std::env::remove_var("OPENAI_API_KEY");
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let c = PersistedConfig { url: Some("https://api.example.com".into()), token: Some("tok".into()) };
        save(&c, Some(&path)).unwrap();
        let back = load(Some(&path)).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn env_var_overrides_persisted_token() {
        let _guard = ENV_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        save(&PersistedConfig { url: None, token: Some("file-token".into()) }, Some(&path)).unwrap();
        std::env::set_var("ANTHROPIC_AUTH_TOKEN", "env-token");
        let c = load(Some(&path)).unwrap();
        assert_eq!(c.token.as_deref(), Some("env-token"));
        std::env::remove_var("ANTHROPIC_AUTH_TOKEN");
    }
}
