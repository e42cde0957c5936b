// crates/keyfed-core/src/interfaces/mod.rs
// ============================================================================
// Module: Keyfed Interfaces
// Description: Backend-agnostic interfaces for storage, secrets, and upload.
// Purpose: Define the contract surfaces used by the synchronization engine.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Interfaces define how the engine integrates with external systems without
//! embedding backend-specific details. Each seam is deliberately narrow (one
//! or two methods) so tests can substitute fakes and capture the exact
//! arguments the engine produced. Implementations must fail closed on
//! missing or invalid data.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::identifiers::BatchTag;
use crate::core::identifiers::ParameterName;
use crate::core::identifiers::SecretName;
use crate::core::identifiers::StateTableKey;
use crate::core::submission::Submission;
use crate::core::submission::SubmissionFilter;
use crate::core::submission::UploadCursor;

// ============================================================================
// SECTION: Submission Repository
// ============================================================================

/// Submission repository errors.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Underlying store I/O failed.
    #[error("submission repository io error: {0}")]
    Io(String),
    /// Requested object does not exist.
    #[error("submission object not found: {0}")]
    NotFound(String),
    /// Stored object metadata is invalid.
    #[error("submission repository invalid data: {0}")]
    Invalid(String),
}

/// Read-only view of the object store holding raw key submissions.
pub trait SubmissionRepository {
    /// Lists submissions passing the filter, in ascending cursor order.
    ///
    /// Listings are finite and re-callable; repeated calls with the same
    /// filter observe at least the same submissions.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] when the listing cannot be produced.
    fn list(&self, filter: &SubmissionFilter) -> Result<Vec<Submission>, RepositoryError>;

    /// Fetches the raw content bytes of one submission object.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] when the object cannot be read.
    fn fetch(&self, submission: &Submission) -> Result<Vec<u8>, RepositoryError>;
}

impl<T: SubmissionRepository + ?Sized> SubmissionRepository for Box<T> {
    fn list(&self, filter: &SubmissionFilter) -> Result<Vec<Submission>, RepositoryError> {
        (**self).list(filter)
    }

    fn fetch(&self, submission: &Submission) -> Result<Vec<u8>, RepositoryError> {
        (**self).fetch(submission)
    }
}

// ============================================================================
// SECTION: Batch Tag Ledger
// ============================================================================

/// Batch tag ledger errors.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Ledger store I/O failed.
    #[error("ledger io error: {0}")]
    Io(String),
    /// Stored cursor state is corrupted or undecodable.
    #[error("ledger corruption: {0}")]
    Corrupt(String),
    /// Ledger store reported an error.
    #[error("ledger store error: {0}")]
    Store(String),
}

/// Durable cursor store tracking federated upload progress.
///
/// # Invariants
/// - `commit` is invoked strictly after a gateway acknowledgement and must
///   be durable before the engine proceeds to the next page.
/// - Reads are strongly consistent with prior commits (read-after-write).
pub trait BatchTagLedger {
    /// Loads the committed cursor for one federation direction.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] when the stored state cannot be read or
    /// decoded.
    fn load(&self, table: &StateTableKey) -> Result<Option<UploadCursor>, LedgerError>;

    /// Durably replaces the committed cursor in a single atomic write.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] when the write cannot be made durable; the
    /// engine treats this as fatal for the run.
    fn commit(&self, table: &StateTableKey, cursor: &UploadCursor) -> Result<(), LedgerError>;
}

// ============================================================================
// SECTION: Secret Source
// ============================================================================

/// Secret and parameter retrieval errors.
#[derive(Debug, Error)]
pub enum SecretError {
    /// Named secret or parameter does not exist.
    #[error("secret not found: {0}")]
    Missing(String),
    /// Secret backend I/O failed.
    #[error("secret source io error: {0}")]
    Io(String),
    /// Retrieved value is unusable.
    #[error("secret value invalid: {0}")]
    Invalid(String),
}

/// Secret value wrapper that keeps credentials out of debug output.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretValue(String);

impl SecretValue {
    /// Wraps a retrieved secret value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Exposes the underlying secret material.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretValue(..)")
    }
}

/// Source of credentials and signing key material, read once per run.
pub trait SecretSource {
    /// Retrieves a named secret (gateway bearer token).
    ///
    /// # Errors
    ///
    /// Returns [`SecretError`] when the secret is missing or unreadable.
    fn secret(&self, name: &SecretName) -> Result<SecretValue, SecretError>;

    /// Retrieves a named parameter (signing key seed).
    ///
    /// # Errors
    ///
    /// Returns [`SecretError`] when the parameter is missing or unreadable.
    fn parameter(&self, name: &ParameterName) -> Result<String, SecretError>;
}

impl<T: SecretSource + ?Sized> SecretSource for Box<T> {
    fn secret(&self, name: &SecretName) -> Result<SecretValue, SecretError> {
        (**self).secret(name)
    }

    fn parameter(&self, name: &ParameterName) -> Result<String, SecretError> {
        (**self).parameter(name)
    }
}

// ============================================================================
// SECTION: Batch Signer
// ============================================================================

/// Batch signing errors.
#[derive(Debug, Error)]
pub enum SignError {
    /// Signing key material could not be obtained.
    #[error("signing key unavailable: {0}")]
    KeyUnavailable(String),
    /// The signing operation itself failed.
    #[error("signing failed: {0}")]
    Signing(String),
}

/// Detached signature over the canonical bytes of one upload batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSignature {
    /// Identifier of the signing authority presented to the gateway.
    pub issuer: String,
    /// Signature algorithm label.
    pub algorithm: String,
    /// Detached compact JWS bound to the exact payload bytes.
    pub jws: String,
}

/// Signs serialized batch payloads for gateway provenance checks.
pub trait BatchSigner {
    /// Produces a detached signature over the exact payload bytes.
    ///
    /// # Errors
    ///
    /// Returns [`SignError`] when key material is unavailable or signing
    /// fails; the engine treats this as fatal for the run.
    fn sign(&self, payload: &[u8]) -> Result<BatchSignature, SignError>;
}

// ============================================================================
// SECTION: Interop Uploader
// ============================================================================

/// Signed batch handed to the upload client.
///
/// # Invariants
/// - `payload` holds the canonical JSON array the signature is bound to;
///   the client must transmit these exact bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedBatch {
    /// Canonical JSON array of exposure upload records.
    pub payload: Vec<u8>,
    /// Detached signature over `payload`.
    pub signature: BatchSignature,
    /// Number of exposure records in the payload.
    pub exposure_count: usize,
}

/// Gateway acknowledgement for one accepted upload batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    /// Opaque acknowledgement token for the accepted batch.
    pub batch_tag: BatchTag,
    /// Number of exposures the gateway inserted.
    pub inserted_exposures: u64,
}

/// Upload client errors.
#[derive(Debug, Error)]
pub enum UploadError {
    /// Gateway returned a non-success status.
    #[error("gateway rejected upload with status {status}")]
    Rejected {
        /// HTTP status code returned by the gateway.
        status: u16,
    },
    /// Gateway could not be reached.
    #[error("gateway unreachable: {0}")]
    Unreachable(String),
    /// Gateway returned success with an undecodable acknowledgement.
    #[error("gateway acknowledgement invalid: {0}")]
    InvalidAcknowledgement(String),
}

/// Request/response boundary to the federation gateway.
///
/// Implementations perform no retries and mutate no local state; retry
/// policy belongs to the scheduler re-invoking the whole run.
pub trait InteropUploader {
    /// Submits one signed batch and parses the acknowledgement.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError`] on rejection, transport failure, or an
    /// undecodable acknowledgement.
    fn upload(&self, batch: &SignedBatch) -> Result<UploadResult, UploadError>;
}
