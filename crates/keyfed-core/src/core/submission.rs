// crates/keyfed-core/src/core/submission.rs
// ============================================================================
// Module: Keyfed Submission Model
// Description: Stored submission records, eligibility windows, and cursors.
// Purpose: Define the durable continuation state and listing contracts.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A [`Submission`] is an immutable record discovered in the object store;
//! key bytes are fetched lazily through the repository. The durable
//! [`UploadCursor`] pairs the gateway's verbatim batch tag with an
//! engine-computed `(submitted_at, object_key)` watermark. The watermark
//! totally orders submissions, so paging never re-lists a committed item
//! even when several submissions share a timestamp.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::BatchTag;
use crate::core::identifiers::BucketName;
use crate::core::identifiers::ObjectKey;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Submission
// ============================================================================

/// Immutable record of one stored key submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    /// Bucket the submission object lives in.
    pub bucket: BucketName,
    /// Storage key of the submission object.
    pub object_key: ObjectKey,
    /// Storage-assigned submission instant.
    pub submitted_at: Timestamp,
}

impl Submission {
    /// Returns the total-order cursor position of this submission.
    #[must_use]
    pub fn cursor_position(&self) -> (Timestamp, &str) {
        (self.submitted_at, self.object_key.as_str())
    }
}

// ============================================================================
// SECTION: Upload Cursor
// ============================================================================

/// Durable continuation state for one federation direction.
///
/// # Invariants
/// - `batch_tag` is the gateway's verbatim token; it is never parsed locally
///   and is `None` only before the first acknowledged upload.
/// - The `(submitted_at, object_key)` watermark names the last submission
///   covered by committed state.
/// - Mutated exactly once per acknowledged batch, strictly after
///   acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadCursor {
    /// Last acknowledged gateway batch tag, replayed verbatim.
    pub batch_tag: Option<BatchTag>,
    /// Submission instant of the last covered submission.
    pub submitted_at: Timestamp,
    /// Object key of the last covered submission.
    pub object_key: ObjectKey,
}

impl UploadCursor {
    /// Returns whether the given submission is already covered by this
    /// cursor.
    #[must_use]
    pub fn covers(&self, submission: &Submission) -> bool {
        submission.cursor_position() <= (self.submitted_at, self.object_key.as_str())
    }
}

// ============================================================================
// SECTION: Eligibility Window
// ============================================================================

/// Eligibility window for one listing pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionWindow {
    /// First-ever run: take submissions at or after the backfill horizon.
    Backfill {
        /// Earliest admitted submission instant.
        not_before: Timestamp,
    },
    /// Continuation run: take submissions strictly after the cursor
    /// watermark.
    Resume {
        /// Committed cursor to resume from.
        cursor: UploadCursor,
    },
}

impl SubmissionWindow {
    /// Returns whether the given submission falls inside this window.
    #[must_use]
    pub fn admits(&self, submission: &Submission) -> bool {
        match self {
            Self::Backfill {
                not_before,
            } => submission.submitted_at >= *not_before,
            Self::Resume {
                cursor,
            } => !cursor.covers(submission),
        }
    }
}

// ============================================================================
// SECTION: Listing Filter
// ============================================================================

/// Filter applied by repository listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionFilter {
    /// Object key prefixes to admit; empty admits every key.
    pub prefixes: Vec<String>,
    /// Eligibility window for this pass.
    pub window: SubmissionWindow,
}

impl SubmissionFilter {
    /// Returns whether the given submission passes prefix and window checks.
    #[must_use]
    pub fn admits(&self, submission: &Submission) -> bool {
        let prefix_ok = self.prefixes.is_empty()
            || self.prefixes.iter().any(|prefix| submission.object_key.as_str().starts_with(prefix));
        prefix_ok && self.window.admits(submission)
    }
}

/// Sorts submissions into ascending cursor order.
///
/// Listings must hand pages to the engine in this order so the committed
/// watermark always names the greatest covered position.
pub fn sort_by_cursor_position(submissions: &mut [Submission]) {
    submissions.sort_by(|left, right| left.cursor_position().cmp(&right.cursor_position()));
}
