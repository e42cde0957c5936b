// crates/keyfed-interop/src/lib.rs
// ============================================================================
// Module: Keyfed Interop Library
// Description: Gateway client and batch signing for key federation.
// Purpose: Expose the upload client and Ed25519 JWS signer.
// Dependencies: crate::{client, jws}
// ============================================================================

//! ## Overview
//! `keyfed-interop` implements the outbound half of the federation exchange:
//! detached Ed25519 JWS signatures over canonical batch bytes, and the
//! authenticated HTTP client that submits signed batches and parses the
//! gateway acknowledgement.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod client;
pub mod jws;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use client::ClientError;
pub use client::InteropClient;
pub use client::InteropClientConfig;
pub use client::SIGNATURE_HEADER;
pub use jws::Ed25519BatchSigner;
pub use jws::JWS_ALGORITHM;
pub use jws::JwsError;
pub use jws::verify_detached;
