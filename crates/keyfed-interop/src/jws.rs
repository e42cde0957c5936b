// crates/keyfed-interop/src/jws.rs
// ============================================================================
// Module: Detached JWS Batch Signing
// Description: Ed25519 detached compact JWS over canonical payload bytes.
// Purpose: Prove batch provenance to the gateway without embedding payloads.
// Dependencies: base64, ed25519-dalek, keyfed-core, serde_json
// ============================================================================

//! ## Overview
//! Batches are signed with a detached compact JWS (unencoded payload,
//! `b64: false`): the signing input is `base64url(header) || '.' || payload`
//! over the exact canonical bytes, and the serialized form is
//! `header..signature` with the payload omitted. Any change to the payload
//! bytes invalidates the signature. Key material is a 32-byte Ed25519 seed,
//! base64-encoded in the parameter store, fetched once per run.

// ============================================================================
// SECTION: Imports
// ============================================================================

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as BASE64_URL;
use ed25519_dalek::Signature;
use ed25519_dalek::Signer;
use ed25519_dalek::SigningKey;
use ed25519_dalek::Verifier;
use ed25519_dalek::VerifyingKey;
use keyfed_core::BatchSignature;
use keyfed_core::BatchSigner;
use keyfed_core::ParameterName;
use keyfed_core::SecretSource;
use keyfed_core::SignError;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// JWS algorithm label for Ed25519 signatures.
pub const JWS_ALGORITHM: &str = "EdDSA";
/// Byte length of an Ed25519 seed.
const SEED_BYTES: usize = 32;

// ============================================================================
// SECTION: Verification Errors
// ============================================================================

/// Detached JWS verification errors.
#[derive(Debug, Error)]
pub enum JwsError {
    /// Serialized JWS is not a detached compact form.
    #[error("malformed detached jws: {0}")]
    Malformed(String),
    /// Header declares an unsupported algorithm or encoding.
    #[error("unsupported jws header: {0}")]
    Header(String),
    /// Signature does not verify against the payload.
    #[error("jws signature invalid")]
    Signature,
}

// ============================================================================
// SECTION: Signer
// ============================================================================

/// Ed25519 batch signer producing detached compact JWS values.
#[derive(Debug)]
pub struct Ed25519BatchSigner {
    /// Private signing key.
    signing_key: SigningKey,
    /// Issuer label placed in the protected header.
    issuer: String,
}

impl Ed25519BatchSigner {
    /// Creates a signer from an existing key.
    #[must_use]
    pub fn new(signing_key: SigningKey, issuer: String) -> Self {
        Self {
            signing_key,
            issuer,
        }
    }

    /// Creates a signer from a base64-encoded seed held in the parameter
    /// store.
    ///
    /// # Errors
    ///
    /// Returns [`SignError::KeyUnavailable`] when the parameter is missing
    /// or does not decode to a valid seed.
    pub fn from_parameter<S: SecretSource>(
        secrets: &S,
        parameter: &ParameterName,
        issuer: impl Into<String>,
    ) -> Result<Self, SignError> {
        let encoded = secrets
            .parameter(parameter)
            .map_err(|err| SignError::KeyUnavailable(err.to_string()))?;
        let seed = BASE64
            .decode(encoded.trim())
            .map_err(|err| SignError::KeyUnavailable(err.to_string()))?;
        let seed: [u8; SEED_BYTES] = seed
            .try_into()
            .map_err(|_| SignError::KeyUnavailable("seed must be 32 bytes".to_string()))?;
        Ok(Self::new(SigningKey::from_bytes(&seed), issuer.into()))
    }

    /// Returns the verifying key for this signer.
    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Builds the protected header for this signer.
    fn protected_header(&self) -> Result<String, SignError> {
        let header = json!({
            "alg": JWS_ALGORITHM,
            "b64": false,
            "crit": ["b64"],
            "iss": self.issuer,
        });
        let bytes =
            serde_json::to_vec(&header).map_err(|err| SignError::Signing(err.to_string()))?;
        Ok(BASE64_URL.encode(bytes))
    }
}

impl BatchSigner for Ed25519BatchSigner {
    fn sign(&self, payload: &[u8]) -> Result<BatchSignature, SignError> {
        let header = self.protected_header()?;
        let mut signing_input = Vec::with_capacity(header.len() + 1 + payload.len());
        signing_input.extend_from_slice(header.as_bytes());
        signing_input.push(b'.');
        signing_input.extend_from_slice(payload);
        let signature = self.signing_key.sign(&signing_input);
        Ok(BatchSignature {
            issuer: self.issuer.clone(),
            algorithm: JWS_ALGORITHM.to_string(),
            jws: format!("{header}..{}", BASE64_URL.encode(signature.to_bytes())),
        })
    }
}

// ============================================================================
// SECTION: Verification
// ============================================================================

/// Protected header fields checked during verification.
#[derive(Debug, Deserialize)]
struct ProtectedHeader {
    /// Declared signature algorithm.
    alg: String,
    /// Declared payload encoding; must be `false` for detached payloads.
    b64: bool,
}

/// Verifies a detached compact JWS against the exact payload bytes.
///
/// # Errors
///
/// Returns [`JwsError`] when the serialization is malformed, the header is
/// unsupported, or the signature does not verify.
pub fn verify_detached(
    jws: &str,
    payload: &[u8],
    verifying_key: &VerifyingKey,
) -> Result<(), JwsError> {
    let mut parts = jws.split('.');
    let (Some(header), Some(""), Some(signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(JwsError::Malformed("expected header..signature".to_string()));
    };
    let header_bytes =
        BASE64_URL.decode(header).map_err(|err| JwsError::Malformed(err.to_string()))?;
    let parsed: ProtectedHeader =
        serde_json::from_slice(&header_bytes).map_err(|err| JwsError::Header(err.to_string()))?;
    if parsed.alg != JWS_ALGORITHM {
        return Err(JwsError::Header(format!("unsupported algorithm: {}", parsed.alg)));
    }
    if parsed.b64 {
        return Err(JwsError::Header("payload must be unencoded".to_string()));
    }
    let signature_bytes =
        BASE64_URL.decode(signature).map_err(|err| JwsError::Malformed(err.to_string()))?;
    let signature = Signature::from_slice(&signature_bytes).map_err(|_| JwsError::Signature)?;
    let mut signing_input = Vec::with_capacity(header.len() + 1 + payload.len());
    signing_input.extend_from_slice(header.as_bytes());
    signing_input.push(b'.');
    signing_input.extend_from_slice(payload);
    verifying_key.verify(&signing_input, &signature).map_err(|_| JwsError::Signature)
}
