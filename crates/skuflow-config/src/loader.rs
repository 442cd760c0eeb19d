// SPDX-FileCopyrightText: 2026 Skuflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./skuflow.toml` > `~/.config/skuflow/skuflow.toml` > `/etc/skuflow/skuflow.toml`
//! with environment variable overrides via `SKUFLOW_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::SkuflowConfig;

/// System-wide config file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/skuflow/skuflow.toml";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "skuflow.toml";

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/skuflow/skuflow.toml` (system-wide)
/// 3. `~/.config/skuflow/skuflow.toml` (user XDG config)
/// 4. `./skuflow.toml` (local directory)
/// 5. `SKUFLOW_*` environment variables
pub fn load_config() -> Result<SkuflowConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<SkuflowConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SkuflowConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<SkuflowConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SkuflowConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading.
///
/// Returns the Figment before extraction so callers can inspect metadata.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(SkuflowConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_FILE))
        .merge(env_provider())
}

/// `~/.config/skuflow/skuflow.toml`, if a config dir exists on this platform.
pub fn user_config_path() -> Option<std::path::PathBuf> {
    dirs::config_dir().map(|d| d.join("skuflow").join(LOCAL_CONFIG_FILE))
}

/// Top-level config sections, used to map env var names onto dotted keys.
const SECTIONS: &[&str] = &["log", "storage", "queue", "matching", "archive"];

/// Create the environment variable provider using explicit `map()` for section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` because key names contain
/// underscores: `SKUFLOW_QUEUE_MAX_RETRIES` must map to `queue.max_retries`,
/// not `queue.max.retries`. Only the leading section name is split off, so
/// `SKUFLOW_MATCHING_STORAGE_WEIGHT` maps to `matching.storage_weight`.
fn env_provider() -> Env {
    Env::prefixed("SKUFLOW_").map(|key| {
        // `key` is the lowercased env var name with prefix stripped.
        let key_str = key.as_str();
        let mapped = SECTIONS
            .iter()
            .find_map(|section| {
                key_str
                    .strip_prefix(section)
                    .and_then(|rest| rest.strip_prefix('_'))
                    .map(|rest| format!("{section}.{rest}"))
            })
            .unwrap_or_else(|| key_str.to_string());
        mapped.into()
    })
}
