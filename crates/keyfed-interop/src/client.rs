// crates/keyfed-interop/src/client.rs
// ============================================================================
// Module: Interop Upload Client
// Description: Authenticated gateway exchange for signed key batches.
// Purpose: Submit signed batches and parse gateway acknowledgements.
// Dependencies: keyfed-core, reqwest, serde_json, url
// ============================================================================

//! ## Overview
//! `InteropClient` is a pure request/response boundary to the federation
//! gateway: it transmits the exact canonical payload bytes of a signed
//! batch, carries the detached signature in a request header, and parses
//! the `batchTag`/`insertedExposures` acknowledgement. It performs no
//! retries and mutates no local state; retry policy belongs to the
//! scheduler re-invoking the whole run.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Read;
use std::time::Duration;

use keyfed_core::InteropUploader;
use keyfed_core::SecretValue;
use keyfed_core::SignedBatch;
use keyfed_core::UploadError;
use keyfed_core::UploadResult;
use reqwest::blocking::Client;
use reqwest::redirect::Policy;
use thiserror::Error;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Gateway upload endpoint path.
const UPLOAD_PATH: &str = "diagnosiskeys/upload";
/// Request header carrying the detached batch signature.
pub const SIGNATURE_HEADER: &str = "X-Batch-Signature";
/// Maximum accepted acknowledgement body size.
const MAX_RESPONSE_BYTES: usize = 64 * 1024;
/// Default request timeout in milliseconds.
const DEFAULT_TIMEOUT_MS: u64 = 30_000;

// ============================================================================
// SECTION: Config
// ============================================================================

/// Configuration for the gateway upload client.
#[derive(Debug, Clone)]
pub struct InteropClientConfig {
    /// Gateway base URL.
    pub base_url: String,
    /// Bearer credential presented on every request.
    pub auth_token: SecretValue,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
    /// User agent string for outbound requests.
    pub user_agent: String,
}

impl InteropClientConfig {
    /// Creates a config with default timeout and user agent.
    #[must_use]
    pub fn new(base_url: impl Into<String>, auth_token: SecretValue) -> Self {
        Self {
            base_url: base_url.into(),
            auth_token,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            user_agent: "keyfed/0.1".to_string(),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Client construction errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Gateway base URL does not parse.
    #[error("invalid gateway base url: {0}")]
    InvalidUrl(String),
    /// HTTP client could not be built.
    #[error("http client build failed: {0}")]
    Build(String),
}

// ============================================================================
// SECTION: Client
// ============================================================================

/// Authenticated upload client for the federation gateway.
pub struct InteropClient {
    /// Resolved upload endpoint.
    upload_url: Url,
    /// Bearer credential.
    auth_token: SecretValue,
    /// HTTP client used for outbound requests.
    client: Client,
}

impl InteropClient {
    /// Creates a new gateway client.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the base URL does not parse or the HTTP
    /// client cannot be built.
    pub fn new(config: InteropClientConfig) -> Result<Self, ClientError> {
        let endpoint = format!("{}/{UPLOAD_PATH}", config.base_url.trim_end_matches('/'));
        let upload_url =
            Url::parse(&endpoint).map_err(|err| ClientError::InvalidUrl(err.to_string()))?;
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.clone())
            .redirect(Policy::none())
            .build()
            .map_err(|err| ClientError::Build(err.to_string()))?;
        Ok(Self {
            upload_url,
            auth_token: config.auth_token,
            client,
        })
    }
}

impl InteropUploader for InteropClient {
    fn upload(&self, batch: &SignedBatch) -> Result<UploadResult, UploadError> {
        let response = self
            .client
            .post(self.upload_url.clone())
            .header("Authorization", format!("Bearer {}", self.auth_token.expose()))
            .header("Content-Type", "application/json")
            .header(SIGNATURE_HEADER, batch.signature.jws.clone())
            .body(batch.payload.clone())
            .send()
            .map_err(|err| UploadError::Unreachable(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::Rejected {
                status: status.as_u16(),
            });
        }
        let body = read_response_limited(response)?;
        serde_json::from_slice(&body)
            .map_err(|err| UploadError::InvalidAcknowledgement(err.to_string()))
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Reads the acknowledgement body while enforcing a byte limit.
fn read_response_limited(response: reqwest::blocking::Response) -> Result<Vec<u8>, UploadError> {
    let mut buf = Vec::new();
    let mut handle = response.take(MAX_RESPONSE_BYTES as u64 + 1);
    handle.read_to_end(&mut buf).map_err(|err| UploadError::Unreachable(err.to_string()))?;
    if buf.len() > MAX_RESPONSE_BYTES {
        return Err(UploadError::InvalidAcknowledgement(
            "acknowledgement exceeds size limit".to_string(),
        ));
    }
    Ok(buf)
}
