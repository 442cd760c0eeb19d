// SPDX-FileCopyrightText: 2026 Skuflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Skuflow intake pipeline.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Skuflow configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SkuflowConfig {
    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Intake queue and worker settings.
    #[serde(default)]
    pub queue: QueueConfig,

    /// SKU matching weights and threshold.
    #[serde(default)]
    pub matching: MatchingConfig,

    /// Archival settings.
    #[serde(default)]
    pub archive: ArchiveConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,

    /// How long SQLite waits on a lock held by another process.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("skuflow").join("skuflow.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("skuflow.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

/// Intake queue configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    /// Maximum items a worker claims per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Retry ceiling. Items at or above it stay `failed` for manual inspection.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Claims older than this are considered abandoned by a crashed worker.
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,

    /// Idle delay between claim attempts when the queue is empty.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// How often the stale-claim sweep runs.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Number of concurrent worker loops started by `skuflow run`.
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl QueueConfig {
    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            stale_after_secs: default_stale_after_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            sweep_interval_secs: default_sweep_interval_secs(),
            workers: default_workers(),
        }
    }
}

fn default_batch_size() -> usize {
    25
}

fn default_max_retries() -> u32 {
    5
}

fn default_stale_after_secs() -> u64 {
    600
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_workers() -> usize {
    2
}

/// SKU matching configuration.
///
/// The default weights sum to 1.0 so a perfect match scores exactly 1.0.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MatchingConfig {
    #[serde(default = "default_model_weight")]
    pub model_weight: f64,

    #[serde(default = "default_storage_weight")]
    pub storage_weight: f64,

    #[serde(default = "default_color_weight")]
    pub color_weight: f64,

    #[serde(default = "default_carrier_weight")]
    pub carrier_weight: f64,

    /// Fraction of the model weight awarded for prefix/substring model matches.
    #[serde(default = "default_partial_model_credit")]
    pub partial_model_credit: f64,

    /// Fraction of the carrier weight awarded to unlocked SKUs when no
    /// exact-carrier SKU qualifies.
    #[serde(default = "default_unlocked_factor")]
    pub unlocked_factor: f64,

    /// Minimum score for a result to count as matched.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            model_weight: default_model_weight(),
            storage_weight: default_storage_weight(),
            color_weight: default_color_weight(),
            carrier_weight: default_carrier_weight(),
            partial_model_credit: default_partial_model_credit(),
            unlocked_factor: default_unlocked_factor(),
            threshold: default_threshold(),
        }
    }
}

fn default_model_weight() -> f64 {
    0.35
}

fn default_storage_weight() -> f64 {
    0.25
}

fn default_color_weight() -> f64 {
    0.15
}

fn default_carrier_weight() -> f64 {
    0.25
}

fn default_partial_model_credit() -> f64 {
    0.8
}

fn default_unlocked_factor() -> f64 {
    0.5
}

fn default_threshold() -> f64 {
    0.6
}

/// Archival configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ArchiveConfig {
    /// Reason recorded on archive rows when the caller gives none.
    #[serde(default = "default_archive_reason")]
    pub default_reason: String,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            default_reason: default_archive_reason(),
        }
    }
}

fn default_archive_reason() -> String {
    "manual".to_string()
}
