// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Legacy `~/.echo/auth.json`, kept for `OPENAI_API_KEY`-era installs.
/// Written with mode `0600` where the platform supports it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LegacyAuth {
    pub api_key: Option<String>,
    #[serde(rename = "OPENAI_API_KEY", skip_serializing_if = "Option::is_none")]
    pub openai_api_key: Option<String>,
    pub updated: Option<chrono::DateTime<chrono::Utc>>,
}

pub fn auth_path() -> anyhow::Result<PathBuf> {
    Ok(crate::loader::echo_home()?.join("auth.json"))
}

pub fn load_legacy_auth() -> anyhow::Result<Option<LegacyAuth>> {
    let path = auth_path()?;
    if !path.exists() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(&path)?;
    Ok(Some(serde_json::from_str(&text)?))
}

pub fn save_legacy_auth(auth: &LegacyAuth) -> anyhow::Result<()> {
    let path = auth_path()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let text = serde_json::to_string_pretty(auth)?;
    std::fs::write(&path, text)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(&path)?.permissions();
        perms.set_mode(0o600);
        std::fs::set_permissions(&path, perms)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_auth_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("HOME", dir.path());
        assert!(load_legacy_auth().unwrap().is_none());
    }
}
