// crates/keyfed-core/src/runtime/assembler.rs
// ============================================================================
// Module: Keyfed Payload Assembler
// Description: Converts stored submissions into gateway upload records.
// Purpose: Decode key material and apply classification and regional tagging.
// Dependencies: base64, crate::core, thiserror
// ============================================================================

//! ## Overview
//! The assembler turns one stored submission plus its fetched content bytes
//! into an [`ExposureUpload`]. Assembly failures are per-item: a malformed
//! submission is skipped and counted by the engine, never fatal to the run.

// ============================================================================
// SECTION: Imports
// ============================================================================

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use thiserror::Error;

use crate::core::config::UploadConfig;
use crate::core::exposure::DEFAULT_DAYS_SINCE_ONSET;
use crate::core::exposure::DIAGNOSIS_KEY_BYTES;
use crate::core::exposure::ExposureUpload;
use crate::core::exposure::FALLBACK_TRANSMISSION_RISK_LEVEL;
use crate::core::exposure::FULL_DAY_ROLLING_PERIOD;
use crate::core::exposure::classify_object_key;
use crate::core::submission::Submission;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Per-item assembly errors.
#[derive(Debug, Error)]
pub enum AssembleError {
    /// Submission content is not valid UTF-8/base64 text.
    #[error("submission content is not valid base64: {0}")]
    InvalidEncoding(String),
    /// Decoded key material has the wrong length.
    #[error("decoded key is {actual} bytes, expected {expected}")]
    WrongKeyLength {
        /// Required key length in bytes.
        expected: usize,
        /// Observed key length in bytes.
        actual: usize,
    },
    /// Submission instant cannot be mapped to a rolling interval.
    #[error("submission instant {0} has no rolling interval")]
    InvalidInstant(i64),
}

// ============================================================================
// SECTION: Assembler
// ============================================================================

/// Maps submissions onto the gateway upload schema for one run.
#[derive(Debug, Clone)]
pub struct PayloadAssembler {
    /// Region code tagged onto every upload.
    region: String,
    /// Transmission risk level applied to every upload.
    transmission_risk_level: i32,
}

impl PayloadAssembler {
    /// Creates an assembler from the active run configuration.
    #[must_use]
    pub fn from_config(config: &UploadConfig) -> Self {
        let transmission_risk_level = if config.risk_level_default_enabled {
            config.risk_level_default
        } else {
            FALLBACK_TRANSMISSION_RISK_LEVEL
        };
        Self {
            region: config.region.clone(),
            transmission_risk_level,
        }
    }

    /// Assembles one upload record from a submission and its content bytes.
    ///
    /// Content is base64 text (surrounding ASCII whitespace ignored) that
    /// must decode to exactly [`DIAGNOSIS_KEY_BYTES`] bytes. The rolling
    /// start number is the 10-minute interval index of the submission
    /// instant.
    ///
    /// # Errors
    ///
    /// Returns [`AssembleError`] when the key material is malformed; the
    /// caller skips the submission and continues the batch.
    pub fn assemble(
        &self,
        submission: &Submission,
        content: &[u8],
    ) -> Result<ExposureUpload, AssembleError> {
        let text = std::str::from_utf8(content)
            .map_err(|err| AssembleError::InvalidEncoding(err.to_string()))?;
        let key_bytes = BASE64
            .decode(text.trim())
            .map_err(|err| AssembleError::InvalidEncoding(err.to_string()))?;
        if key_bytes.len() != DIAGNOSIS_KEY_BYTES {
            return Err(AssembleError::WrongKeyLength {
                expected: DIAGNOSIS_KEY_BYTES,
                actual: key_bytes.len(),
            });
        }
        let rolling_start_number = submission
            .submitted_at
            .rolling_interval()
            .ok_or(AssembleError::InvalidInstant(submission.submitted_at.unix_seconds()))?;
        let (test_type, report_type) = classify_object_key(&submission.object_key);
        Ok(ExposureUpload {
            key_data: BASE64.encode(&key_bytes),
            rolling_start_number,
            transmission_risk_level: self.transmission_risk_level,
            rolling_period: FULL_DAY_ROLLING_PERIOD,
            regions: vec![self.region.clone()],
            test_type,
            report_type,
            days_since_onset: DEFAULT_DAYS_SINCE_ONSET,
        })
    }
}
