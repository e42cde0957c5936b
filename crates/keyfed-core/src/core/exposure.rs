// crates/keyfed-core/src/core/exposure.rs
// ============================================================================
// Module: Keyfed Exposure Records
// Description: Gateway upload schema and submission classification.
// Purpose: Map stored submissions onto the interoperability wire vocabulary.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! [`ExposureUpload`] is the wire record accepted by the federation gateway.
//! Classification of a submission into its `(test type, report type)` pair is
//! a pure, total function of the storage path: unrecognized or absent test
//! type segments always map to `UNKNOWN`/`UNKNOWN` rather than being dropped.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::ObjectKey;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Exact byte length of a diagnosis key.
pub const DIAGNOSIS_KEY_BYTES: usize = 16;
/// Rolling period covering a full day of 10-minute intervals.
pub const FULL_DAY_ROLLING_PERIOD: u32 = 144;
/// Transmission risk level applied when no configured default is active.
pub const FALLBACK_TRANSMISSION_RISK_LEVEL: i32 = 7;
/// Days since onset applied to all federated uploads.
pub const DEFAULT_DAYS_SINCE_ONSET: i32 = 0;

// ============================================================================
// SECTION: Test Type
// ============================================================================

/// Test procedure that produced a submitted diagnosis key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TestType {
    /// Laboratory PCR result.
    LabResult,
    /// Assisted rapid antigen result.
    RapidResult,
    /// Self-reported rapid antigen result.
    RapidSelfReported,
    /// Unrecognized or absent test type segment.
    Unknown,
}

impl TestType {
    /// Parses a storage path segment into a test type.
    ///
    /// Matching is case-sensitive against the fixed vocabulary; any other
    /// value yields [`TestType::Unknown`].
    #[must_use]
    pub fn from_segment(segment: &str) -> Self {
        match segment {
            "LAB_RESULT" => Self::LabResult,
            "RAPID_RESULT" => Self::RapidResult,
            "RAPID_SELF_REPORTED" => Self::RapidSelfReported,
            _ => Self::Unknown,
        }
    }

    /// Returns the report type implied by this test type.
    #[must_use]
    pub const fn report_type(self) -> ReportType {
        match self {
            Self::LabResult => ReportType::ConfirmedTest,
            Self::RapidResult | Self::RapidSelfReported | Self::Unknown => ReportType::Unknown,
        }
    }

    /// Returns the stable wire label for this test type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LabResult => "LAB_RESULT",
            Self::RapidResult => "RAPID_RESULT",
            Self::RapidSelfReported => "RAPID_SELF_REPORTED",
            Self::Unknown => "UNKNOWN",
        }
    }
}

// ============================================================================
// SECTION: Report Type
// ============================================================================

/// Diagnosis report classification accepted by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportType {
    /// Confirmed laboratory test.
    ConfirmedTest,
    /// Confirmed clinical diagnosis without a laboratory test.
    ConfirmedClinicalDiagnosis,
    /// Self-reported diagnosis.
    SelfReported,
    /// Recursive exposure report.
    Recursive,
    /// Unknown report classification.
    Unknown,
}

impl ReportType {
    /// Returns the stable wire label for this report type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ConfirmedTest => "CONFIRMED_TEST",
            Self::ConfirmedClinicalDiagnosis => "CONFIRMED_CLINICAL_DIAGNOSIS",
            Self::SelfReported => "SELF_REPORTED",
            Self::Recursive => "RECURSIVE",
            Self::Unknown => "UNKNOWN",
        }
    }
}

// ============================================================================
// SECTION: Classification
// ============================================================================

/// Classifies a submission object key into its `(test type, report type)`
/// pair.
///
/// The test type is carried by the second `/`-separated segment of the key
/// (`mobile/LAB_RESULT/abc`). Absent or unrecognized segments classify as
/// `(Unknown, Unknown)`; classification is total and never errors.
#[must_use]
pub fn classify_object_key(key: &ObjectKey) -> (TestType, ReportType) {
    let test_type =
        key.as_str().split('/').nth(1).map_or(TestType::Unknown, TestType::from_segment);
    (test_type, test_type.report_type())
}

// ============================================================================
// SECTION: Exposure Upload
// ============================================================================

/// Wire record for one diagnosis key sent to the federation gateway.
///
/// # Invariants
/// - `key_data` is the base64 encoding of exactly [`DIAGNOSIS_KEY_BYTES`]
///   bytes.
/// - The `(test_type, report_type)` pair is derived deterministically from
///   the submission path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExposureUpload {
    /// Base64-encoded diagnosis key material.
    pub key_data: String,
    /// 10-minute interval index at which the key became valid.
    pub rolling_start_number: u32,
    /// Transmission risk level in the range 0 through 8.
    pub transmission_risk_level: i32,
    /// Number of 10-minute intervals the key covers.
    pub rolling_period: u32,
    /// Region codes the key applies to.
    pub regions: Vec<String>,
    /// Test procedure classification.
    pub test_type: TestType,
    /// Report classification.
    pub report_type: ReportType,
    /// Days between symptom onset and the key's validity window.
    pub days_since_onset: i32,
}
