// SPDX-FileCopyrightText: 2026 Skuflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Skuflow configuration system.

use skuflow_config::diagnostic::ConfigError;
use skuflow_config::model::SkuflowConfig;
use skuflow_config::{load_and_validate_str, load_config, load_config_from_str};

/// Valid TOML with every section deserializes into the typed model.
#[test]
fn valid_toml_deserializes_into_skuflow_config() {
    let toml = r#"
[log]
level = "debug"

[storage]
database_path = "/tmp/skuflow-test.db"
wal_mode = false
busy_timeout_ms = 250

[queue]
batch_size = 10
max_retries = 3
stale_after_secs = 30
poll_interval_ms = 100
sweep_interval_secs = 5
workers = 4

[matching]
threshold = 0.7

[archive]
default_reason = "returned to vendor"
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.log.level, "debug");
    assert_eq!(config.storage.database_path, "/tmp/skuflow-test.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.storage.busy_timeout_ms, 250);
    assert_eq!(config.queue.batch_size, 10);
    assert_eq!(config.queue.max_retries, 3);
    assert_eq!(config.queue.stale_after().as_secs(), 30);
    assert_eq!(config.queue.poll_interval().as_millis(), 100);
    assert_eq!(config.queue.workers, 4);
    assert_eq!(config.matching.threshold, 0.7);
    assert_eq!(config.matching.model_weight, 0.35);
    assert_eq!(config.archive.default_reason, "returned to vendor");
}

/// An empty file yields compiled defaults.
#[test]
fn empty_toml_uses_defaults() {
    let config = load_and_validate_str("").expect("defaults should validate");
    assert_eq!(config.log.level, "info");
    assert!(config.storage.wal_mode);
    assert_eq!(config.queue.batch_size, 25);
    assert_eq!(config.queue.max_retries, 5);
    assert_eq!(config.archive.default_reason, "manual");
    assert!(config.storage.database_path.ends_with("skuflow.db"));
}

/// A typo in the [queue] section is rejected with a suggestion.
#[test]
fn unknown_queue_key_suggests_correction() {
    let toml = r#"
[queue]
batch_sise = 5
"#;

    let errors = load_and_validate_str(toml).unwrap_err();
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ConfigError::UnknownKey {
            key, suggestion, ..
        } => {
            assert_eq!(key, "batch_sise");
            assert_eq!(suggestion.as_deref(), Some("batch_size"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

/// An unknown top-level section is rejected.
#[test]
fn unknown_section_is_rejected() {
    let toml = r#"
[telemetry]
enabled = true
"#;

    let errors = load_and_validate_str(toml).unwrap_err();
    assert!(matches!(&errors[0], ConfigError::UnknownKey { key, .. } if key == "telemetry"));
}

/// Wrong value types surface as InvalidType with the dotted key path.
#[test]
fn wrong_type_reports_key_path() {
    let toml = r#"
[queue]
workers = "many"
"#;

    let errors = load_and_validate_str(toml).unwrap_err();
    match &errors[0] {
        ConfigError::InvalidType { key, .. } => assert_eq!(key, "queue.workers"),
        other => panic!("expected InvalidType, got {other:?}"),
    }
}

/// Semantic checks run after deserialization and report every problem.
#[test]
fn semantic_errors_are_collected() {
    let toml = r#"
[queue]
batch_size = 0

[matching]
threshold = 1.5
"#;

    let errors = load_and_validate_str(toml).unwrap_err();
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().all(|e| matches!(e, ConfigError::Validation { .. })));
}

/// `SKUFLOW_*` env vars override file values, including keys with underscores.
#[test]
fn env_vars_override_local_file() {
    figment::Jail::expect_with(|jail| {
        jail.create_file(
            "skuflow.toml",
            r#"
[queue]
max_retries = 2
"#,
        )?;
        jail.set_env("SKUFLOW_QUEUE_MAX_RETRIES", "9");
        jail.set_env("SKUFLOW_MATCHING_STORAGE_WEIGHT", "0.3");
        jail.set_env("SKUFLOW_LOG_LEVEL", "trace");

        let config: SkuflowConfig = load_config()?;
        assert_eq!(config.queue.max_retries, 9);
        assert_eq!(config.matching.storage_weight, 0.3);
        assert_eq!(config.log.level, "trace");
        Ok(())
    });
}

/// The local `skuflow.toml` is picked up from the working directory.
#[test]
fn local_file_is_loaded() {
    figment::Jail::expect_with(|jail| {
        jail.create_file(
            "skuflow.toml",
            r#"
[archive]
default_reason = "audit"
"#,
        )?;

        let config = load_config()?;
        assert_eq!(config.archive.default_reason, "audit");
        Ok(())
    });
}

/// Diagnostics render without panicking.
#[test]
fn diagnostics_render() {
    let errors = load_and_validate_str("[queue]\nmax_retry = 1\n").unwrap_err();
    let report = miette::Report::new(errors.into_iter().next().unwrap());
    assert!(format!("{report:?}").contains("max_retries"));
}
