// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./gatehouse.toml` > `~/.config/gatehouse/gatehouse.toml`
//! > `/etc/gatehouse/gatehouse.toml` with environment variable overrides via the
//! `GATEHOUSE_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::GatehouseConfig;

/// Top-level sections recognized in env var names.
const SECTIONS: &[&str] = &[
    "daemon",
    "storage",
    "session",
    "reconciler",
    "ingest",
    "bot",
    "gateway",
    "transport",
];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/gatehouse/gatehouse.toml` (system-wide)
/// 3. `~/.config/gatehouse/gatehouse.toml` (user XDG config)
/// 4. `./gatehouse.toml` (local directory)
/// 5. `GATEHOUSE_*` environment variables
pub fn load_config() -> Result<GatehouseConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<GatehouseConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(GatehouseConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<GatehouseConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(GatehouseConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading.
///
/// Returns the Figment before extraction so callers can inspect metadata.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(GatehouseConfig::default()))
        .merge(Toml::file("/etc/gatehouse/gatehouse.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("gatehouse/gatehouse.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("gatehouse.toml"))
        .merge(env_provider())
}

/// Environment provider with explicit section-to-dot mapping.
///
/// Only the first underscore after a known section name becomes a dot, so
/// `GATEHOUSE_SESSION_MAX_RECONNECT_ATTEMPTS` maps to
/// `session.max_reconnect_attempts`.
fn env_provider() -> Env {
    Env::prefixed("GATEHOUSE_").map(|key| map_env_key(key.as_str()).into())
}

pub(crate) fn map_env_key(key: &str) -> String {
    for section in SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|r| r.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
