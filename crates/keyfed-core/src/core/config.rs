// crates/keyfed-core/src/core/config.rs
// ============================================================================
// Module: Keyfed Upload Configuration
// Description: Per-run configuration for the upload synchronization engine.
// Purpose: Provide strict, fail-closed validation of run parameters.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! [`UploadConfig`] is constructed once per run from external configuration
//! sources and is read-only thereafter. Validation fails closed: a run never
//! starts with out-of-range limits or an unusable gateway endpoint.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::identifiers::ParameterName;
use crate::core::identifiers::SecretName;
use crate::core::identifiers::StateTableKey;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default cap on upload iterations per run.
pub const DEFAULT_MAX_SUBSEQUENT_BATCH_UPLOAD_COUNT: u32 = 100;
/// Default backfill horizon in days for a first-ever run.
pub const DEFAULT_INITIAL_UPLOAD_HISTORY_DAYS: u32 = 14;
/// Upper bound accepted for the backfill horizon.
pub const MAX_INITIAL_UPLOAD_HISTORY_DAYS: u32 = 28;
/// Highest transmission risk level accepted by the gateway.
pub const MAX_TRANSMISSION_RISK_LEVEL: i32 = 8;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Upload configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Iteration cap must allow at least one page.
    #[error("max_subsequent_batch_upload_count must be at least 1")]
    ZeroIterationCap,
    /// Backfill horizon is out of range.
    #[error("initial_upload_history_days must be between 1 and {max}", max = MAX_INITIAL_UPLOAD_HISTORY_DAYS)]
    HistoryDaysOutOfRange,
    /// Configured risk level default is out of range.
    #[error("risk_level_default {0} is outside 0..={max}", max = MAX_TRANSMISSION_RISK_LEVEL)]
    RiskLevelOutOfRange(i32),
    /// Gateway base URL is unusable.
    #[error("gateway_base_url is invalid: {0}")]
    InvalidGatewayUrl(String),
    /// Region code is empty.
    #[error("region must not be empty")]
    EmptyRegion,
    /// Ledger state table key is empty.
    #[error("state_table must not be empty")]
    EmptyStateTable,
}

// ============================================================================
// SECTION: Upload Config
// ============================================================================

/// Immutable per-run configuration for the upload engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Feature gate; a disabled run completes with zero work.
    #[serde(default)]
    pub upload_enabled: bool,
    /// Cap on upload iterations within one run.
    #[serde(default = "default_iteration_cap")]
    pub max_subsequent_batch_upload_count: u32,
    /// Backfill horizon in days, used only when no cursor exists.
    #[serde(default = "default_history_days")]
    pub initial_upload_history_days: u32,
    /// Page size; 0 takes all eligible submissions in one page.
    #[serde(default)]
    pub max_upload_batch_size: usize,
    /// Whether the configured risk level default applies.
    #[serde(default)]
    pub risk_level_default_enabled: bool,
    /// Risk level applied when the default is enabled.
    #[serde(default = "default_risk_level")]
    pub risk_level_default: i32,
    /// Base URL of the federation gateway.
    pub gateway_base_url: String,
    /// Secret holding the gateway bearer token.
    pub auth_token_secret_name: SecretName,
    /// Parameter holding the batch signing key seed.
    pub signing_key_parameter_name: ParameterName,
    /// Ledger row key for this federation direction.
    pub state_table: StateTableKey,
    /// Region code tagged onto every upload.
    pub region: String,
    /// Object key prefixes eligible for upload; empty admits every key.
    #[serde(default)]
    pub upload_prefixes: Vec<String>,
}

impl UploadConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for out-of-range limits, an unusable gateway
    /// URL, or empty mandatory fields.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_subsequent_batch_upload_count == 0 {
            return Err(ConfigError::ZeroIterationCap);
        }
        if self.initial_upload_history_days == 0
            || self.initial_upload_history_days > MAX_INITIAL_UPLOAD_HISTORY_DAYS
        {
            return Err(ConfigError::HistoryDaysOutOfRange);
        }
        if self.risk_level_default_enabled
            && !(0..=MAX_TRANSMISSION_RISK_LEVEL).contains(&self.risk_level_default)
        {
            return Err(ConfigError::RiskLevelOutOfRange(self.risk_level_default));
        }
        if !(self.gateway_base_url.starts_with("https://")
            || self.gateway_base_url.starts_with("http://"))
        {
            return Err(ConfigError::InvalidGatewayUrl(self.gateway_base_url.clone()));
        }
        if self.region.trim().is_empty() {
            return Err(ConfigError::EmptyRegion);
        }
        if self.state_table.as_str().trim().is_empty() {
            return Err(ConfigError::EmptyStateTable);
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Returns the default iteration cap.
const fn default_iteration_cap() -> u32 {
    DEFAULT_MAX_SUBSEQUENT_BATCH_UPLOAD_COUNT
}

/// Returns the default backfill horizon in days.
const fn default_history_days() -> u32 {
    DEFAULT_INITIAL_UPLOAD_HISTORY_DAYS
}

/// Returns the default transmission risk level.
const fn default_risk_level() -> i32 {
    crate::core::exposure::FALLBACK_TRANSMISSION_RISK_LEVEL
}
