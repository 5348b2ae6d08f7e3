// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};

/// The only config ever persisted to `~/.echo/config.toml` (§6).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PersistedConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_persisted_config_has_no_url_or_token() {
        let c = PersistedConfig::default();
        assert!(c.url.is_none());
        assert!(c.token.is_none());
    }

    #[test]
    fn round_trips_through_toml() {
        let c = PersistedConfig { url: Some("https://api.example.com".into()), token: Some("secret".into()) };
        let text = toml::to_string(&c).unwrap();
        let back: PersistedConfig = toml::from_str(&text).unwrap();
        assert_eq!(c, back);
    }
}
