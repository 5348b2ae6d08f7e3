// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Configuration loading.
//!
//! Two schemas coexisted in the source this was distilled from: a full
//! `Config{Model, SandboxMode, Features, ...}` and a minimal
//! `Config{URL, Token}`. This crate follows the spec's resolution of that
//! ambiguity (see `DESIGN.md`): [`PersistedConfig`] is the *only* thing ever
//! written to `~/.echo/config.toml`; everything else lives in
//! [`RuntimeConfig`], an in-memory struct of defaults overridable via
//! repeated `-c key=value` CLI flags.

mod auth;
mod loader;
mod overrides;
mod runtime;
mod schema;

pub use auth::LegacyAuth;
pub use loader::{config_path, echo_home, load, save};
pub use overrides::{apply_overrides, parse_kv};
pub use runtime::{AgentMode, RuntimeConfig};
pub use schema::PersistedConfig;
