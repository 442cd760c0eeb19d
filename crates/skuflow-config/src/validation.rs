// SPDX-FileCopyrightText: 2026 Skuflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as non-empty paths, positive batch sizes and weights in range.

use crate::diagnostic::ConfigError;
use crate::model::{MatchingConfig, SkuflowConfig};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &SkuflowConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if !LOG_LEVELS.contains(&config.log.level.to_lowercase().as_str()) {
        fail(format!(
            "log.level `{}` is not one of {}",
            config.log.level,
            LOG_LEVELS.join(", ")
        ));
    }

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    let queue = &config.queue;
    if queue.batch_size == 0 {
        fail("queue.batch_size must be at least 1".to_string());
    }
    if queue.workers == 0 {
        fail("queue.workers must be at least 1".to_string());
    }
    if queue.stale_after_secs == 0 {
        fail("queue.stale_after_secs must be at least 1".to_string());
    }
    if queue.poll_interval_ms == 0 {
        fail("queue.poll_interval_ms must be at least 1".to_string());
    }
    if queue.sweep_interval_secs == 0 {
        fail("queue.sweep_interval_secs must be at least 1".to_string());
    }

    for message in matching_errors(&config.matching) {
        fail(message);
    }

    if config.archive.default_reason.trim().is_empty() {
        fail("archive.default_reason must not be empty".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn matching_errors(matching: &MatchingConfig) -> Vec<String> {
    let mut errors = Vec::new();

    let weights = [
        ("model_weight", matching.model_weight),
        ("storage_weight", matching.storage_weight),
        ("color_weight", matching.color_weight),
        ("carrier_weight", matching.carrier_weight),
    ];
    for (name, value) in weights {
        if !(0.0..=1.0).contains(&value) {
            errors.push(format!("matching.{name} must be within 0.0..=1.0, got {value}"));
        }
    }

    let sum: f64 = weights.iter().map(|(_, w)| w).sum();
    if (sum - 1.0).abs() > 1e-6 {
        errors.push(format!(
            "matching weights must sum to 1.0 so scores stay within 0.0..=1.0, got {sum}"
        ));
    }

    for (name, value) in [
        ("partial_model_credit", matching.partial_model_credit),
        ("unlocked_factor", matching.unlocked_factor),
    ] {
        if !(0.0..=1.0).contains(&value) {
            errors.push(format!("matching.{name} must be within 0.0..=1.0, got {value}"));
        }
    }

    if !(matching.threshold > 0.0 && matching.threshold <= 1.0) {
        errors.push(format!(
            "matching.threshold must be within (0.0, 1.0], got {}",
            matching.threshold
        ));
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages(config: &SkuflowConfig) -> Vec<String> {
        validate_config(config)
            .unwrap_err()
            .into_iter()
            .map(|e| e.to_string())
            .collect()
    }

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&SkuflowConfig::default()).is_ok());
    }

    #[test]
    fn empty_database_path_fails_validation() {
        let mut config = SkuflowConfig::default();
        config.storage.database_path = " ".to_string();
        assert!(messages(&config).iter().any(|m| m.contains("database_path")));
    }

    #[test]
    fn zero_batch_and_workers_are_both_reported() {
        let mut config = SkuflowConfig::default();
        config.queue.batch_size = 0;
        config.queue.workers = 0;
        let msgs = messages(&config);
        assert!(msgs.iter().any(|m| m.contains("batch_size")));
        assert!(msgs.iter().any(|m| m.contains("workers")));
    }

    #[test]
    fn weights_must_sum_to_one() {
        let mut config = SkuflowConfig::default();
        config.matching.color_weight = 0.30;
        assert!(messages(&config).iter().any(|m| m.contains("sum to 1.0")));
    }

    #[test]
    fn rebalanced_weights_pass() {
        let mut config = SkuflowConfig::default();
        config.matching.model_weight = 0.40;
        config.matching.color_weight = 0.10;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn threshold_out_of_range_fails() {
        let mut config = SkuflowConfig::default();
        config.matching.threshold = 0.0;
        assert!(messages(&config).iter().any(|m| m.contains("threshold")));
    }

    #[test]
    fn unknown_log_level_fails() {
        let mut config = SkuflowConfig::default();
        config.log.level = "verbose".to_string();
        assert!(messages(&config).iter().any(|m| m.contains("log.level")));
    }
}
