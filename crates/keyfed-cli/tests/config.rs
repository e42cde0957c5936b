// crates/keyfed-cli/tests/config.rs
// ============================================================================
// Module: CLI Configuration Tests
// Description: TOML loading, example round trip, and fail-closed parsing.
// Purpose: Ensure the shipped example stays valid and bad configs never run.
// Dependencies: keyfed-cli, keyfed-core, tempfile, toml
// ============================================================================

//! ## Overview
//! Exercises the configuration loader: the shipped example document parses
//! and validates, backend selection is honored, defaults apply, and invalid
//! documents fail closed.

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

use keyfed_cli::config::ConfigFileError;
use keyfed_cli::config::KeyfedConfig;
use keyfed_cli::config::SecretsConfig;
use keyfed_cli::config::StoreConfig;
use keyfed_cli::config::config_toml_example;
use keyfed_cli::config::load_config;
use keyfed_core::UploadConfig;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn write_config(contents: &str) -> (TempDir, std::path::PathBuf) {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("keyfed.toml");
    fs::write(&path, contents).unwrap();
    (temp, path)
}

// ============================================================================
// SECTION: Example Round Trip
// ============================================================================

/// Verifies the shipped example loads and validates end to end.
#[test]
fn example_config_loads_and_validates() {
    let (_temp, path) = write_config(config_toml_example());

    let config = load_config(Some(&path)).unwrap();

    assert!(config.upload.upload_enabled);
    assert_eq!(config.upload.region, "GB-EAW");
    assert_eq!(config.signing.issuer, "GB-EAW");
    assert!(config.events.json_lines);
    assert!(matches!(config.store, StoreConfig::S3 { .. }));
    assert!(matches!(config.secrets, SecretsConfig::Env { .. }));
}

/// Verifies directory store and file secrets backends are selectable.
#[test]
fn alternate_backends_parse() {
    let config: KeyfedConfig = toml::from_str(
        r#"
        [upload]
        gateway_base_url = "https://interop.example"
        auth_token_secret_name = "authToken"
        signing_key_parameter_name = "signingKey"
        state_table = "federation-upload"
        region = "GB-EAW"

        [store]
        kind = "dir"
        root = "submissions"

        [ledger]
        path = "ledger.sqlite"

        [secrets]
        kind = "file"
        path = "secrets.json"
        "#,
    )
    .unwrap();

    assert!(
        matches!(config.store, StoreConfig::Dir { ref bucket_label, .. } if bucket_label.as_str() == "local")
    );
    assert!(matches!(config.secrets, SecretsConfig::File { .. }));
    assert_eq!(config.signing.issuer, "keyfed");
}

// ============================================================================
// SECTION: Upload Defaults
// ============================================================================

/// Verifies omitted optional fields take their documented defaults.
#[test]
fn upload_section_defaults_apply() {
    let upload: UploadConfig = toml::from_str(
        r#"
        gateway_base_url = "https://interop.example"
        auth_token_secret_name = "authToken"
        signing_key_parameter_name = "signingKey"
        state_table = "federation-upload"
        region = "GB-EAW"
        "#,
    )
    .unwrap();

    assert!(!upload.upload_enabled);
    assert_eq!(upload.max_subsequent_batch_upload_count, 100);
    assert_eq!(upload.initial_upload_history_days, 14);
    assert_eq!(upload.max_upload_batch_size, 0);
    assert_eq!(upload.risk_level_default, 7);
    assert!(upload.upload_prefixes.is_empty());
}

// ============================================================================
// SECTION: Fail-Closed Parsing
// ============================================================================

/// Verifies a missing file is an I/O error, not a default config.
#[test]
fn missing_config_file_fails_closed() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("absent.toml");

    let error = load_config(Some(&path)).unwrap_err();

    assert!(matches!(error, ConfigFileError::Io(_)));
}

/// Verifies malformed TOML is rejected.
#[test]
fn malformed_toml_fails_closed() {
    let (_temp, path) = write_config("not toml at all [");

    let error = load_config(Some(&path)).unwrap_err();

    assert!(matches!(error, ConfigFileError::Parse(_)));
}

/// Verifies an out-of-range upload setting is rejected after parsing.
#[test]
fn invalid_upload_settings_fail_closed() {
    let mut contents = config_toml_example().to_string();
    contents = contents.replace(
        "max_subsequent_batch_upload_count = 100",
        "max_subsequent_batch_upload_count = 0",
    );
    let (_temp, path) = write_config(&contents);

    let error = load_config(Some(&path)).unwrap_err();

    assert!(matches!(error, ConfigFileError::Invalid(_)));
}

/// Verifies an unknown store backend is rejected.
#[test]
fn unknown_store_backend_fails_closed() {
    let mut contents = config_toml_example().to_string();
    contents = contents.replace("kind = \"s3\"", "kind = \"ftp\"");
    let (_temp, path) = write_config(&contents);

    let error = load_config(Some(&path)).unwrap_err();

    assert!(matches!(error, ConfigFileError::Parse(_)));
}
