// crates/keyfed-core/src/core/identifiers.rs
// ============================================================================
// Module: Keyfed Identifiers
// Description: Canonical opaque identifiers for submissions, secrets, and tags.
// Purpose: Provide strongly typed, serializable IDs with stable string forms.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! This module defines the canonical string-based identifiers used throughout
//! the federation engine. Identifiers are opaque and serialize as strings.
//! The batch tag in particular is issued by the gateway and is never parsed
//! locally; it is stored and replayed verbatim.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Identifier Types
// ============================================================================

/// Name of the object store bucket holding raw key submissions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BucketName(String);

impl BucketName {
    /// Creates a new bucket name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the bucket name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BucketName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for BucketName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for BucketName {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Storage key of a single submission object.
///
/// # Invariants
/// - The second `/`-separated segment, when present, carries the test type
///   vocabulary word used for classification.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectKey(String);

impl ObjectKey {
    /// Creates a new object key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the object key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for ObjectKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ObjectKey {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Opaque acknowledgement token issued by the federation gateway.
///
/// # Invariants
/// - Tags form a total order of acceptance on the gateway side; their
///   internal structure is never interpreted locally.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchTag(String);

impl BatchTag {
    /// Creates a new batch tag.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// Returns the batch tag as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BatchTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for BatchTag {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for BatchTag {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Name of a secret retrieved from the secret source (bearer credentials).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretName(String);

impl SecretName {
    /// Creates a new secret name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the secret name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SecretName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for SecretName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Name of a parameter retrieved from the secret source (signing key seed).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterName(String);

impl ParameterName {
    /// Creates a new parameter name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the parameter name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParameterName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for ParameterName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Ledger row key identifying one federation direction.
///
/// # Invariants
/// - A single key maps to at most one durable upload cursor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateTableKey(String);

impl StateTableKey {
    /// Creates a new state table key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the state table key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StateTableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for StateTableKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
