// crates/keyfed-providers/src/secrets.rs
// ============================================================================
// Module: Secret Sources
// Description: Environment and file backed secret/parameter retrieval.
// Purpose: Supply credentials and signing key material with hard limits.
// Dependencies: keyfed-core, serde_json, std
// ============================================================================

//! ## Overview
//! Two [`SecretSource`] implementations: process environment lookups with a
//! documented name mangling and deterministic overrides, and a single JSON
//! document on disk. Both enforce hard size limits and fail closed on
//! missing or oversized values.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use keyfed_core::ParameterName;
use keyfed_core::SecretError;
use keyfed_core::SecretName;
use keyfed_core::SecretSource;
use keyfed_core::SecretValue;
use serde::Deserialize;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum bytes allowed for a single secret or parameter value.
const MAX_VALUE_BYTES: usize = 64 * 1024;
/// Maximum size of a secrets file document.
const MAX_SECRETS_FILE_BYTES: usize = 1024 * 1024;

// ============================================================================
// SECTION: Environment Source
// ============================================================================

/// Configuration for the environment secret source.
///
/// # Invariants
/// - `overrides` take precedence over process environment reads.
#[derive(Debug, Clone, Default)]
pub struct EnvSecretSourceConfig {
    /// Prefix prepended to every mangled variable name.
    pub prefix: Option<String>,
    /// Optional override map used for deterministic lookups.
    pub overrides: Option<BTreeMap<String, String>>,
}

/// Secret source reading process environment variables.
///
/// Names are mangled to environment convention: ASCII-uppercased, with every
/// non-alphanumeric character replaced by `_`, and the configured prefix
/// prepended (`authToken` with prefix `KEYFED` reads `KEYFED_AUTHTOKEN`).
#[derive(Debug, Clone, Default)]
pub struct EnvSecretSource {
    /// Source configuration.
    config: EnvSecretSourceConfig,
}

impl EnvSecretSource {
    /// Creates an environment secret source.
    #[must_use]
    pub const fn new(config: EnvSecretSourceConfig) -> Self {
        Self {
            config,
        }
    }

    /// Returns the mangled environment variable name for a logical name.
    #[must_use]
    pub fn variable_name(&self, name: &str) -> String {
        let mangled: String = name
            .chars()
            .map(|ch| if ch.is_ascii_alphanumeric() { ch.to_ascii_uppercase() } else { '_' })
            .collect();
        match &self.config.prefix {
            Some(prefix) => format!("{prefix}_{mangled}"),
            None => mangled,
        }
    }

    /// Looks up a logical name through overrides, then the environment.
    fn lookup(&self, name: &str) -> Result<String, SecretError> {
        let variable = self.variable_name(name);
        let value = match &self.config.overrides {
            Some(overrides) => overrides.get(&variable).cloned(),
            None => std::env::var(&variable).ok(),
        };
        let value = value.ok_or_else(|| SecretError::Missing(variable))?;
        if value.len() > MAX_VALUE_BYTES {
            return Err(SecretError::Invalid(format!("value for {name} exceeds size limit")));
        }
        Ok(value)
    }
}

impl SecretSource for EnvSecretSource {
    fn secret(&self, name: &SecretName) -> Result<SecretValue, SecretError> {
        self.lookup(name.as_str()).map(SecretValue::new)
    }

    fn parameter(&self, name: &ParameterName) -> Result<String, SecretError> {
        self.lookup(name.as_str())
    }
}

// ============================================================================
// SECTION: File Source
// ============================================================================

/// On-disk document holding named secrets and parameters.
#[derive(Debug, Clone, Default, Deserialize)]
struct SecretsDocument {
    /// Named secret values.
    #[serde(default)]
    secrets: BTreeMap<String, String>,
    /// Named parameter values.
    #[serde(default)]
    parameters: BTreeMap<String, String>,
}

/// Secret source backed by a single JSON document.
#[derive(Debug, Clone)]
pub struct FileSecretSource {
    /// Parsed document contents.
    document: SecretsDocument,
}

impl FileSecretSource {
    /// Loads and parses the secrets document at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`SecretError`] when the file is missing, oversized, or not
    /// valid JSON.
    pub fn load(path: &Path) -> Result<Self, SecretError> {
        let metadata = fs::metadata(path).map_err(|err| SecretError::Io(err.to_string()))?;
        if metadata.len() > MAX_SECRETS_FILE_BYTES as u64 {
            return Err(SecretError::Invalid("secrets file exceeds size limit".to_string()));
        }
        let bytes = fs::read(path).map_err(|err| SecretError::Io(err.to_string()))?;
        let document: SecretsDocument =
            serde_json::from_slice(&bytes).map_err(|err| SecretError::Invalid(err.to_string()))?;
        Ok(Self {
            document,
        })
    }

    /// Checks a retrieved value against the hard size limit.
    fn check_value(name: &str, value: &str) -> Result<(), SecretError> {
        if value.len() > MAX_VALUE_BYTES {
            return Err(SecretError::Invalid(format!("value for {name} exceeds size limit")));
        }
        Ok(())
    }
}

impl SecretSource for FileSecretSource {
    fn secret(&self, name: &SecretName) -> Result<SecretValue, SecretError> {
        let value = self
            .document
            .secrets
            .get(name.as_str())
            .ok_or_else(|| SecretError::Missing(name.as_str().to_string()))?;
        Self::check_value(name.as_str(), value)?;
        Ok(SecretValue::new(value.clone()))
    }

    fn parameter(&self, name: &ParameterName) -> Result<String, SecretError> {
        let value = self
            .document
            .parameters
            .get(name.as_str())
            .ok_or_else(|| SecretError::Missing(name.as_str().to_string()))?;
        Self::check_value(name.as_str(), value)?;
        Ok(value.clone())
    }
}
