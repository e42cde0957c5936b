// crates/keyfed-cli/src/config.rs
// ============================================================================
// Module: Keyfed CLI Configuration
// Description: TOML configuration loading for federation runs.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: keyfed-core, keyfed-ledger-sqlite, serde, thiserror, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size limits and
//! fail-closed validation: an unreadable, oversized, or invalid file never
//! starts a run. The file selects the submission store backend, the ledger
//! location, and the secret source alongside the engine's upload settings.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use keyfed_core::ConfigError;
use keyfed_core::UploadConfig;
use keyfed_ledger_sqlite::SqliteLedgerConfig;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "keyfed.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "KEYFED_CONFIG";
/// Maximum configuration file size in bytes.
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Config file could not be read.
    #[error("config file unreadable: {0}")]
    Io(String),
    /// Config file exceeds the size limit.
    #[error("config file exceeds size limit")]
    TooLarge,
    /// Config file is not valid TOML for the expected schema.
    #[error("config file invalid: {0}")]
    Parse(String),
    /// Upload settings failed validation.
    #[error("upload config invalid: {0}")]
    Invalid(#[from] ConfigError),
}

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Top-level CLI configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct KeyfedConfig {
    /// Engine upload settings.
    pub upload: UploadConfig,
    /// Submission store backend selection.
    pub store: StoreConfig,
    /// Durable ledger settings.
    pub ledger: SqliteLedgerConfig,
    /// Secret source selection.
    pub secrets: SecretsConfig,
    /// Batch signing settings.
    #[serde(default)]
    pub signing: SigningConfig,
    /// Event output settings.
    #[serde(default)]
    pub events: EventsConfig,
}

/// Submission store backend selection.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreConfig {
    /// S3-backed submission store.
    S3 {
        /// Bucket holding raw key submissions.
        bucket: String,
        /// AWS region (optional; falls back to environment configuration).
        #[serde(default)]
        region: Option<String>,
        /// Custom endpoint URL (for S3-compatible stores).
        #[serde(default)]
        endpoint: Option<String>,
        /// Force path-style addressing (for S3-compatible stores).
        #[serde(default)]
        force_path_style: bool,
    },
    /// Local directory submission store.
    Dir {
        /// Root directory holding submission files.
        root: PathBuf,
        /// Bucket label reported on listed submissions.
        #[serde(default = "default_bucket_label")]
        bucket_label: String,
    },
}

/// Secret source selection.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SecretsConfig {
    /// Process environment secret source.
    Env {
        /// Prefix prepended to every mangled variable name.
        #[serde(default)]
        prefix: Option<String>,
    },
    /// JSON document secret source.
    File {
        /// Path to the secrets document.
        path: PathBuf,
    },
}

/// Batch signing settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SigningConfig {
    /// Issuer label placed in the signature header.
    #[serde(default = "default_issuer")]
    pub issuer: String,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            issuer: default_issuer(),
        }
    }
}

/// Event output settings.
#[derive(Debug, Clone, Deserialize)]
pub struct EventsConfig {
    /// Emit JSON-line run events to stderr.
    #[serde(default = "default_true")]
    pub json_lines: bool,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            json_lines: true,
        }
    }
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Returns the default bucket label for directory stores.
fn default_bucket_label() -> String {
    "local".to_string()
}

/// Returns the default signature issuer label.
fn default_issuer() -> String {
    "keyfed".to_string()
}

/// Returns `true` for serde defaults.
const fn default_true() -> bool {
    true
}

// ============================================================================
// SECTION: Loading
// ============================================================================

/// Loads and validates the CLI configuration.
///
/// The path is resolved from the explicit argument, then the
/// `KEYFED_CONFIG` environment variable, then `keyfed.toml` in the working
/// directory.
///
/// # Errors
///
/// Returns [`ConfigFileError`] when the file is unreadable, oversized,
/// unparseable, or fails upload validation.
pub fn load_config(path: Option<&Path>) -> Result<KeyfedConfig, ConfigFileError> {
    let resolved = match path {
        Some(path) => path.to_path_buf(),
        None => env::var(CONFIG_ENV_VAR)
            .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_NAME), PathBuf::from),
    };
    let metadata = fs::metadata(&resolved).map_err(|err| ConfigFileError::Io(err.to_string()))?;
    if metadata.len() > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigFileError::TooLarge);
    }
    let contents =
        fs::read_to_string(&resolved).map_err(|err| ConfigFileError::Io(err.to_string()))?;
    let config: KeyfedConfig =
        toml::from_str(&contents).map_err(|err| ConfigFileError::Parse(err.to_string()))?;
    config.upload.validate()?;
    Ok(config)
}

/// Returns a valid example configuration in TOML form.
#[must_use]
pub const fn config_toml_example() -> &'static str {
    r#"# Keyfed federation upload configuration.

[upload]
upload_enabled = true
max_subsequent_batch_upload_count = 100
initial_upload_history_days = 14
max_upload_batch_size = 0
risk_level_default_enabled = false
risk_level_default = 7
gateway_base_url = "https://interop.example"
auth_token_secret_name = "authToken"
signing_key_parameter_name = "signingKey"
state_table = "federation-upload"
region = "GB-EAW"
upload_prefixes = ["mobile/"]

[store]
kind = "s3"
bucket = "submission-bucket"
region = "eu-west-2"

[ledger]
path = "keyfed-ledger.sqlite"

[secrets]
kind = "env"
prefix = "KEYFED"

[signing]
issuer = "GB-EAW"

[events]
json_lines = true
"#
}
