// crates/keyfed-core/src/core/canonical.rs
// ============================================================================
// Module: Keyfed Canonical Serialization
// Description: RFC 8785 JSON canonicalization for signed batch payloads.
// Purpose: Produce the exact byte form a batch signature is bound to.
// Dependencies: serde, serde_jcs
// ============================================================================

//! ## Overview
//! Batch signatures are computed over canonical JSON bytes (RFC 8785 / JCS),
//! never over a logical structure: any re-serialization with different field
//! order or whitespace is a different payload. Every component that signs or
//! verifies a batch must serialize through this module.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when canonicalizing a payload.
#[derive(Debug, Error)]
pub enum CanonicalError {
    /// JSON canonicalization failed.
    #[error("failed to canonicalize json: {0}")]
    Canonicalization(String),
}

// ============================================================================
// SECTION: Canonicalization
// ============================================================================

/// Returns canonical JSON bytes for a serializable value using RFC 8785.
///
/// # Errors
///
/// Returns [`CanonicalError::Canonicalization`] when serialization fails.
pub fn canonical_json_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CanonicalError> {
    serde_jcs::to_vec(value).map_err(|err| CanonicalError::Canonicalization(err.to_string()))
}
