// crates/keyfed-core/src/runtime/engine.rs
// ============================================================================
// Module: Keyfed Synchronization Controller
// Description: Incremental upload state machine for key federation.
// Purpose: Drive paginated, at-most-once batch uploads with durable cursors.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! The controller is the single execution path for an upload run. Each page
//! is listed, assembled, signed, uploaded, and only then committed to the
//! ledger; a failure at any point leaves the cursor at its prior value, so
//! the next scheduled run retries the same still-pending submissions. There
//! is at most one unacknowledged batch in flight at any moment.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;
use thiserror::Error;

use crate::core::canonical::canonical_json_bytes;
use crate::core::config::ConfigError;
use crate::core::config::UploadConfig;
use crate::core::submission::SubmissionFilter;
use crate::core::submission::SubmissionWindow;
use crate::core::submission::UploadCursor;
use crate::core::submission::sort_by_cursor_position;
use crate::core::time::Clock;
use crate::events::UploadEvents;
use crate::interfaces::BatchSigner;
use crate::interfaces::BatchTagLedger;
use crate::interfaces::InteropUploader;
use crate::interfaces::LedgerError;
use crate::interfaces::RepositoryError;
use crate::interfaces::SignError;
use crate::interfaces::SignedBatch;
use crate::interfaces::SubmissionRepository;
use crate::interfaces::UploadError;
use crate::runtime::assembler::PayloadAssembler;

// ============================================================================
// SECTION: Run Summary
// ============================================================================

/// Terminal disposition of a successful run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Feature flag was off; no work was attempted.
    Disabled,
    /// Every eligible submission was federated.
    Drained,
    /// The per-run iteration cap stopped the loop with work remaining.
    IterationCapReached,
}

/// Counters reported by a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Terminal disposition.
    pub outcome: RunOutcome,
    /// Batches acknowledged by the gateway.
    pub batches_sent: u32,
    /// Exposures the gateway reported inserting.
    pub exposures_inserted: u64,
    /// Malformed submissions skipped.
    pub submissions_skipped: u32,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Run-terminating engine errors.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Run configuration failed validation.
    #[error("invalid upload config: {0}")]
    InvalidConfig(#[from] ConfigError),
    /// Submission repository failed.
    #[error("submission repository failed: {0}")]
    Repository(#[from] RepositoryError),
    /// Ledger state could not be read.
    #[error("ledger read failed: {0}")]
    LedgerReadFailed(LedgerError),
    /// Ledger commit could not be made durable.
    #[error("ledger write failed: {0}")]
    LedgerWriteFailed(LedgerError),
    /// Signing key material unavailable or signing failed.
    #[error("signing unavailable: {0}")]
    SigningUnavailable(#[from] SignError),
    /// Gateway rejected the current page.
    #[error("upload rejected with status {status}")]
    UploadRejected {
        /// HTTP status code returned by the gateway.
        status: u16,
    },
    /// Gateway could not be reached for the current page.
    #[error("upload unreachable: {0}")]
    UploadUnreachable(String),
    /// Gateway acknowledged with an undecodable body.
    #[error("upload acknowledgement invalid: {0}")]
    InvalidAcknowledgement(String),
    /// Batch payload could not be canonicalized.
    #[error("batch serialization failed: {0}")]
    Serialization(String),
}

impl From<UploadError> for EngineError {
    fn from(error: UploadError) -> Self {
        match error {
            UploadError::Rejected {
                status,
            } => Self::UploadRejected {
                status,
            },
            UploadError::Unreachable(message) => Self::UploadUnreachable(message),
            UploadError::InvalidAcknowledgement(message) => Self::InvalidAcknowledgement(message),
        }
    }
}

// ============================================================================
// SECTION: Controller
// ============================================================================

/// Upload synchronization controller.
///
/// # Invariants
/// - The ledger is committed strictly after a gateway acknowledgement.
/// - Pages are serialized; the next page's window is derived from the
///   previous page's committed cursor.
pub struct UploadController<R, L, S, U, C, E> {
    /// Immutable run configuration.
    config: UploadConfig,
    /// Submission object store.
    repository: R,
    /// Durable cursor ledger.
    ledger: L,
    /// Batch signing service.
    signer: S,
    /// Gateway upload client.
    uploader: U,
    /// Run clock.
    clock: C,
    /// Event sink.
    events: E,
}

impl<R, L, S, U, C, E> UploadController<R, L, S, U, C, E>
where
    R: SubmissionRepository,
    L: BatchTagLedger,
    S: BatchSigner,
    U: InteropUploader,
    C: Clock,
    E: UploadEvents,
{
    /// Creates a controller after validating the run configuration.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] when the configuration fails
    /// validation.
    pub fn new(
        config: UploadConfig,
        repository: R,
        ledger: L,
        signer: S,
        uploader: U,
        clock: C,
        events: E,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            config,
            repository,
            ledger,
            signer,
            uploader,
            clock,
            events,
        })
    }

    /// Executes one synchronization pass.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] on fatal failure; the ledger retains its last
    /// committed cursor and the next scheduled run resumes from it.
    pub fn run(&self) -> Result<RunSummary, EngineError> {
        match self.run_pass() {
            Ok(summary) => {
                self.events.run_completed(&summary);
                Ok(summary)
            }
            Err(error) => {
                self.events.run_failed(&error);
                Err(error)
            }
        }
    }

    /// Runs the state machine: window resolution, then the paging loop.
    fn run_pass(&self) -> Result<RunSummary, EngineError> {
        let mut summary = RunSummary {
            outcome: RunOutcome::Disabled,
            batches_sent: 0,
            exposures_inserted: 0,
            submissions_skipped: 0,
        };
        if !self.config.upload_enabled {
            return Ok(summary);
        }

        let committed =
            self.ledger.load(&self.config.state_table).map_err(EngineError::LedgerReadFailed)?;
        let mut window = committed.map_or_else(
            || SubmissionWindow::Backfill {
                not_before: self.clock.now().minus_days(self.config.initial_upload_history_days),
            },
            |cursor| SubmissionWindow::Resume {
                cursor,
            },
        );
        self.events.run_started(&window);

        let assembler = PayloadAssembler::from_config(&self.config);
        summary.outcome = RunOutcome::IterationCapReached;
        for _ in 0..self.config.max_subsequent_batch_upload_count {
            let filter = SubmissionFilter {
                prefixes: self.config.upload_prefixes.clone(),
                window: window.clone(),
            };
            let mut page = self.repository.list(&filter)?;
            sort_by_cursor_position(&mut page);
            if self.config.max_upload_batch_size > 0 {
                page.truncate(self.config.max_upload_batch_size);
            }
            let Some(last) = page.last().cloned() else {
                summary.outcome = RunOutcome::Drained;
                break;
            };

            let mut uploads = Vec::with_capacity(page.len());
            for submission in &page {
                let content = self.repository.fetch(submission)?;
                match assembler.assemble(submission, &content) {
                    Ok(upload) => uploads.push(upload),
                    Err(error) => {
                        summary.submissions_skipped += 1;
                        self.events.submission_skipped(&submission.object_key, &error);
                    }
                }
            }

            let carried_tag = match &window {
                SubmissionWindow::Resume {
                    cursor,
                } => cursor.batch_tag.clone(),
                SubmissionWindow::Backfill {
                    ..
                } => None,
            };
            let cursor = if uploads.is_empty() {
                // Page held only malformed submissions: advance the watermark
                // locally so the page is not re-listed forever. No gateway
                // call is made and the acknowledged tag is carried forward.
                UploadCursor {
                    batch_tag: carried_tag,
                    submitted_at: last.submitted_at,
                    object_key: last.object_key.clone(),
                }
            } else {
                let payload = canonical_json_bytes(&uploads)
                    .map_err(|error| EngineError::Serialization(error.to_string()))?;
                let signature = self.signer.sign(&payload)?;
                let batch = SignedBatch {
                    payload,
                    signature,
                    exposure_count: uploads.len(),
                };
                let result = self.uploader.upload(&batch)?;
                summary.batches_sent += 1;
                summary.exposures_inserted += result.inserted_exposures;
                self.events.batch_uploaded(
                    &result.batch_tag,
                    batch.exposure_count,
                    result.inserted_exposures,
                );
                UploadCursor {
                    batch_tag: Some(result.batch_tag),
                    submitted_at: last.submitted_at,
                    object_key: last.object_key.clone(),
                }
            };

            self.ledger
                .commit(&self.config.state_table, &cursor)
                .map_err(EngineError::LedgerWriteFailed)?;
            window = SubmissionWindow::Resume {
                cursor,
            };
        }
        Ok(summary)
    }
}
