// crates/pce-config/tests/config.rs
// ============================================================================
// Module: Configuration Tests
// Description: Tests for layered resolution defaults and validation.
// ============================================================================
//! ## Overview
//! Validates built-in defaults, JSON file overlay, missing-file failures, and
//! the per-field validation rules.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::fs;

use pce_config::ConfigError;
use pce_config::PceConfig;
use tempfile::TempDir;

/// Verifies built-in defaults validate cleanly.
#[test]
fn defaults_validate() {
    let config = PceConfig::default();
    config.validate().unwrap();
    assert_eq!(config.cci.window, 50);
    assert!((config.cci.weights.consistency - 0.35).abs() < f64::EPSILON);
    assert!((config.assistant.cci_floor - 0.55).abs() < f64::EPSILON);
    assert_eq!(config.approvals.ttl_seconds, 24 * 60 * 60);
    assert_eq!(config.approvals.sweep_interval_s, 60);
    assert_eq!(config.openrouter.timeout_s, 12);
}

/// Verifies a JSON file overlays only the fields it names.
#[test]
fn file_overlays_named_fields() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pce.json");
    fs::write(
        &path,
        r#"{
            "api_port": 9100,
            "approvals": { "ttl_seconds": 120 },
            "assistant": { "value_floor": 0.3 }
        }"#,
    )
    .unwrap();

    let config = PceConfig::load(Some(&path)).unwrap();
    assert_eq!(config.api_port, 9100);
    assert_eq!(config.approvals.ttl_seconds, 120);
    assert_eq!(config.approvals.sweep_interval_s, 60);
    assert!((config.assistant.value_floor - 0.3).abs() < f64::EPSILON);
    assert!((config.assistant.cci_floor - 0.55).abs() < f64::EPSILON);
}

/// Verifies an explicit missing path is an error, not a silent default.
#[test]
fn explicit_missing_path_fails() {
    let dir = TempDir::new().unwrap();
    let error = PceConfig::load(Some(&dir.path().join("absent.json"))).unwrap_err();
    assert!(matches!(error, ConfigError::Read(_)));
}

/// Verifies malformed JSON fails to parse.
#[test]
fn malformed_json_fails() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pce.json");
    fs::write(&path, "{ not json").unwrap();
    let error = PceConfig::load(Some(&path)).unwrap_err();
    assert!(matches!(error, ConfigError::Parse(_)));
}

/// Verifies the validation rules reject out-of-range fields.
#[test]
fn validation_rejects_bad_fields() {
    use pce_config::AssistantConfig;
    use pce_config::CciConfig;

    let config = PceConfig { api_port: 0, ..PceConfig::default() };
    assert!(matches!(config.validate().unwrap_err(), ConfigError::Invalid(_)));

    let config = PceConfig {
        cci: CciConfig { window: 2, ..CciConfig::default() },
        ..PceConfig::default()
    };
    assert!(matches!(config.validate().unwrap_err(), ConfigError::Invalid(_)));

    let weights = pce_config::CciWeightsConfig {
        consistency: 0.9,
        ..pce_config::CciWeightsConfig::default()
    };
    let config = PceConfig {
        cci: CciConfig { weights, ..CciConfig::default() },
        ..PceConfig::default()
    };
    assert!(matches!(config.validate().unwrap_err(), ConfigError::Invalid(_)));

    let config = PceConfig {
        assistant: AssistantConfig {
            epsilon_min: 0.9,
            epsilon_start: 0.5,
            ..AssistantConfig::default()
        },
        ..PceConfig::default()
    };
    assert!(matches!(config.validate().unwrap_err(), ConfigError::Invalid(_)));

    let config = PceConfig {
        assistant: AssistantConfig { value_floor: 1.5, ..AssistantConfig::default() },
        ..PceConfig::default()
    };
    assert!(matches!(config.validate().unwrap_err(), ConfigError::Invalid(_)));
}
