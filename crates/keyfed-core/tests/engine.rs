// crates/keyfed-core/tests/engine.rs
// ============================================================================
// Module: Synchronization Controller Tests
// Description: State machine behavior of the upload controller.
// Purpose: Validate windowing, paging, commit ordering, and failure paths.
// Dependencies: keyfed-core, serde_json
// ============================================================================

//! ## Overview
//! Exercises the controller against in-memory collaborators and a spy
//! uploader capturing the exact signed payloads. Covers: the disabled no-op,
//! the empty store, single-page assembly of classified records, rejection
//! without commit, iteration caps, pagination cursors, per-item skips, and
//! fatal signing/ledger failures.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::sync::Arc;
use std::sync::Mutex;

use keyfed_core::BatchSignature;
use keyfed_core::BatchSigner;
use keyfed_core::BatchTag;
use keyfed_core::BatchTagLedger;
use keyfed_core::BucketName;
use keyfed_core::EngineError;
use keyfed_core::ExposureUpload;
use keyfed_core::FixedClock;
use keyfed_core::InMemoryLedger;
use keyfed_core::InMemorySubmissionStore;
use keyfed_core::InteropUploader;
use keyfed_core::LedgerError;
use keyfed_core::ObjectKey;
use keyfed_core::ParameterName;
use keyfed_core::RecordedEvent;
use keyfed_core::RecordingEvents;
use keyfed_core::ReportType;
use keyfed_core::RunOutcome;
use keyfed_core::SecretName;
use keyfed_core::SignError;
use keyfed_core::SignedBatch;
use keyfed_core::StateTableKey;
use keyfed_core::Submission;
use keyfed_core::TestType;
use keyfed_core::Timestamp;
use keyfed_core::UploadConfig;
use keyfed_core::UploadController;
use keyfed_core::UploadCursor;
use keyfed_core::UploadError;
use keyfed_core::UploadResult;

// ============================================================================
// SECTION: Test Doubles
// ============================================================================

/// Signer returning a fixed detached signature.
#[derive(Debug, Clone, Copy)]
struct StaticSigner;

impl BatchSigner for StaticSigner {
    fn sign(&self, _payload: &[u8]) -> Result<BatchSignature, SignError> {
        Ok(BatchSignature {
            issuer: "test-issuer".to_string(),
            algorithm: "EdDSA".to_string(),
            jws: "eyJhbGciOiJFZERTQSJ9..sig".to_string(),
        })
    }
}

/// Signer whose key material is unavailable.
#[derive(Debug, Clone, Copy)]
struct UnavailableSigner;

impl BatchSigner for UnavailableSigner {
    fn sign(&self, _payload: &[u8]) -> Result<BatchSignature, SignError> {
        Err(SignError::KeyUnavailable("no key".to_string()))
    }
}

/// Uploader capturing every batch and acknowledging with sequential tags.
#[derive(Debug, Clone, Default)]
struct SpyUploader {
    /// Captured batches in upload order.
    batches: Arc<Mutex<Vec<SignedBatch>>>,
}

impl SpyUploader {
    fn new() -> Self {
        Self::default()
    }

    fn captured(&self) -> Vec<SignedBatch> {
        self.batches.lock().unwrap().clone()
    }

    fn call_count(&self) -> usize {
        self.batches.lock().unwrap().len()
    }
}

impl InteropUploader for SpyUploader {
    fn upload(&self, batch: &SignedBatch) -> Result<UploadResult, UploadError> {
        let mut guard = self.batches.lock().unwrap();
        guard.push(batch.clone());
        Ok(UploadResult {
            batch_tag: BatchTag::new(format!("tag-{}", guard.len())),
            inserted_exposures: u64::try_from(batch.exposure_count).unwrap(),
        })
    }
}

/// Uploader rejecting every batch with a fixed status.
#[derive(Debug, Clone, Default)]
struct RejectingUploader {
    /// Number of upload attempts observed.
    calls: Arc<Mutex<usize>>,
}

impl RejectingUploader {
    fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

impl InteropUploader for RejectingUploader {
    fn upload(&self, _batch: &SignedBatch) -> Result<UploadResult, UploadError> {
        *self.calls.lock().unwrap() += 1;
        Err(UploadError::Rejected {
            status: 500,
        })
    }
}

/// Ledger whose commits fail after loads succeed.
#[derive(Debug, Clone, Default)]
struct ReadOnlyLedger {
    /// Shared in-memory state used for loads.
    inner: InMemoryLedger,
}

impl BatchTagLedger for ReadOnlyLedger {
    fn load(&self, table: &StateTableKey) -> Result<Option<UploadCursor>, LedgerError> {
        self.inner.load(table)
    }

    fn commit(&self, _table: &StateTableKey, _cursor: &UploadCursor) -> Result<(), LedgerError> {
        Err(LedgerError::Io("disk full".to_string()))
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Run instant: 2020-02-05T10:00:00Z.
const NOW: i64 = 1_580_896_800;
/// Submission instant: 2020-02-04T10:00:00Z.
const SUBMITTED: i64 = 1_580_810_400;
/// Base64 of sixteen `0x42` bytes.
const ENCODED_KEY: &str = "QkJCQkJCQkJCQkJCQkJCQg==";

fn sample_config() -> UploadConfig {
    UploadConfig {
        upload_enabled: true,
        max_subsequent_batch_upload_count: 100,
        initial_upload_history_days: 14,
        max_upload_batch_size: 0,
        risk_level_default_enabled: false,
        risk_level_default: 7,
        gateway_base_url: "https://interop.example".to_string(),
        auth_token_secret_name: SecretName::new("authToken"),
        signing_key_parameter_name: ParameterName::new("signingKey"),
        state_table: StateTableKey::new("federation-upload"),
        region: "GB-EAW".to_string(),
        upload_prefixes: Vec::new(),
    }
}

fn table() -> StateTableKey {
    StateTableKey::new("federation-upload")
}

fn submission(key: &str, unix_seconds: i64) -> Submission {
    Submission {
        bucket: BucketName::new("SUBMISSION_BUCKET"),
        object_key: ObjectKey::new(key),
        submitted_at: Timestamp::from_unix_seconds(unix_seconds),
    }
}

fn store_with(keys: &[(&str, i64)]) -> InMemorySubmissionStore {
    let store = InMemorySubmissionStore::new();
    for (key, at) in keys {
        store.insert(submission(key, *at), ENCODED_KEY.as_bytes().to_vec());
    }
    store
}

fn decoded_payload(batch: &SignedBatch) -> Vec<ExposureUpload> {
    serde_json::from_slice(&batch.payload).unwrap()
}

// ============================================================================
// SECTION: Disabled and Empty Runs
// ============================================================================

/// Verifies a disabled run performs no work and touches nothing.
#[test]
fn disabled_run_is_a_no_op() {
    let mut config = sample_config();
    config.upload_enabled = false;
    let ledger = InMemoryLedger::new();
    let uploader = SpyUploader::new();
    let controller = UploadController::new(
        config,
        store_with(&[("mobile/LAB_RESULT/abc", SUBMITTED)]),
        ledger.clone(),
        StaticSigner,
        uploader.clone(),
        FixedClock::new(Timestamp::from_unix_seconds(NOW)),
        RecordingEvents::new(),
    )
    .unwrap();

    let summary = controller.run().unwrap();

    assert_eq!(summary.outcome, RunOutcome::Disabled);
    assert_eq!(summary.batches_sent, 0);
    assert_eq!(uploader.call_count(), 0);
    assert_eq!(ledger.load(&table()).unwrap(), None);
}

/// Verifies an empty submission set completes with no upload calls.
#[test]
fn empty_store_drains_immediately() {
    let ledger = InMemoryLedger::new();
    let uploader = SpyUploader::new();
    let controller = UploadController::new(
        sample_config(),
        InMemorySubmissionStore::new(),
        ledger.clone(),
        StaticSigner,
        uploader.clone(),
        FixedClock::new(Timestamp::from_unix_seconds(NOW)),
        RecordingEvents::new(),
    )
    .unwrap();

    let summary = controller.run().unwrap();

    assert_eq!(summary.outcome, RunOutcome::Drained);
    assert_eq!(uploader.call_count(), 0);
    assert_eq!(ledger.load(&table()).unwrap(), None);
}

// ============================================================================
// SECTION: Single Page Assembly
// ============================================================================

/// Verifies a single unbounded page carries every classified record.
#[test]
fn single_page_uploads_classified_records() {
    let store = store_with(&[
        ("mobile/LAB_RESULT/abc", SUBMITTED),
        ("mobile/RAPID_RESULT/def", SUBMITTED),
        ("mobile/RAPID_SELF_REPORTED/ghi", SUBMITTED),
    ]);
    let ledger = InMemoryLedger::new();
    let uploader = SpyUploader::new();
    let controller = UploadController::new(
        sample_config(),
        store,
        ledger.clone(),
        StaticSigner,
        uploader.clone(),
        FixedClock::new(Timestamp::from_unix_seconds(NOW)),
        RecordingEvents::new(),
    )
    .unwrap();

    let summary = controller.run().unwrap();

    assert_eq!(summary.outcome, RunOutcome::Drained);
    assert_eq!(summary.batches_sent, 1);
    assert_eq!(summary.exposures_inserted, 3);
    assert_eq!(uploader.call_count(), 1);

    let uploads = decoded_payload(&uploader.captured()[0]);
    let mut pairs: Vec<(TestType, ReportType)> =
        uploads.iter().map(|upload| (upload.test_type, upload.report_type)).collect();
    pairs.sort_by_key(|pair| format!("{pair:?}"));
    assert_eq!(
        pairs,
        vec![
            (TestType::LabResult, ReportType::ConfirmedTest),
            (TestType::RapidResult, ReportType::Unknown),
            (TestType::RapidSelfReported, ReportType::Unknown),
        ]
    );
    for upload in &uploads {
        assert_eq!(upload.key_data, ENCODED_KEY);
        assert_eq!(upload.regions, vec!["GB-EAW".to_string()]);
        assert_eq!(upload.rolling_period, 144);
        assert_eq!(upload.transmission_risk_level, 7);
        assert_eq!(upload.days_since_onset, 0);
        assert_eq!(upload.rolling_start_number, u32::try_from(SUBMITTED / 600).unwrap());
    }

    let cursor = ledger.load(&table()).unwrap().unwrap();
    assert_eq!(cursor.batch_tag, Some(BatchTag::new("tag-1")));
    assert_eq!(cursor.submitted_at, Timestamp::from_unix_seconds(SUBMITTED));
}

// ============================================================================
// SECTION: Rejection Without Commit
// ============================================================================

/// Verifies a gateway rejection leaves the ledger at its prior value.
#[test]
fn rejected_upload_preserves_ledger_state() {
    let ledger = InMemoryLedger::new();
    let uploader = RejectingUploader::default();
    let controller = UploadController::new(
        sample_config(),
        store_with(&[("mobile/LAB_RESULT/abc", SUBMITTED)]),
        ledger.clone(),
        StaticSigner,
        uploader.clone(),
        FixedClock::new(Timestamp::from_unix_seconds(NOW)),
        RecordingEvents::new(),
    )
    .unwrap();

    let error = controller.run().unwrap_err();

    assert!(matches!(
        error,
        EngineError::UploadRejected {
            status: 500,
        }
    ));
    assert_eq!(uploader.call_count(), 1);
    assert_eq!(ledger.load(&table()).unwrap(), None);
}

/// Verifies a rejection on a later page preserves earlier commits.
#[test]
fn rejection_on_later_page_keeps_prior_commits() {
    /// Uploader acknowledging the first batch, rejecting the rest.
    #[derive(Debug, Clone, Default)]
    struct FirstOnlyUploader {
        calls: Arc<Mutex<usize>>,
    }

    impl InteropUploader for FirstOnlyUploader {
        fn upload(&self, batch: &SignedBatch) -> Result<UploadResult, UploadError> {
            let mut guard = self.calls.lock().unwrap();
            *guard += 1;
            if *guard == 1 {
                Ok(UploadResult {
                    batch_tag: BatchTag::new("tag-1"),
                    inserted_exposures: u64::try_from(batch.exposure_count).unwrap(),
                })
            } else {
                Err(UploadError::Rejected {
                    status: 500,
                })
            }
        }
    }

    let mut config = sample_config();
    config.max_upload_batch_size = 1;
    let ledger = InMemoryLedger::new();
    let controller = UploadController::new(
        config,
        store_with(&[
            ("mobile/LAB_RESULT/aaa", SUBMITTED),
            ("mobile/LAB_RESULT/bbb", SUBMITTED + 60),
        ]),
        ledger.clone(),
        StaticSigner,
        FirstOnlyUploader::default(),
        FixedClock::new(Timestamp::from_unix_seconds(NOW)),
        RecordingEvents::new(),
    )
    .unwrap();

    let error = controller.run().unwrap_err();

    assert!(matches!(
        error,
        EngineError::UploadRejected {
            status: 500,
        }
    ));
    let cursor = ledger.load(&table()).unwrap().unwrap();
    assert_eq!(cursor.batch_tag, Some(BatchTag::new("tag-1")));
    assert_eq!(cursor.object_key, ObjectKey::new("mobile/LAB_RESULT/aaa"));
}

// ============================================================================
// SECTION: Paging and Iteration Cap
// ============================================================================

/// Verifies the iteration cap bounds upload calls in one run.
#[test]
fn iteration_cap_bounds_upload_calls() {
    let mut config = sample_config();
    config.max_upload_batch_size = 1;
    config.max_subsequent_batch_upload_count = 2;
    let ledger = InMemoryLedger::new();
    let uploader = SpyUploader::new();
    let controller = UploadController::new(
        config,
        store_with(&[
            ("mobile/LAB_RESULT/aaa", SUBMITTED),
            ("mobile/LAB_RESULT/bbb", SUBMITTED + 60),
            ("mobile/LAB_RESULT/ccc", SUBMITTED + 120),
        ]),
        ledger.clone(),
        StaticSigner,
        uploader.clone(),
        FixedClock::new(Timestamp::from_unix_seconds(NOW)),
        RecordingEvents::new(),
    )
    .unwrap();

    let summary = controller.run().unwrap();

    assert_eq!(summary.outcome, RunOutcome::IterationCapReached);
    assert_eq!(summary.batches_sent, 2);
    assert_eq!(uploader.call_count(), 2);
    let cursor = ledger.load(&table()).unwrap().unwrap();
    assert_eq!(cursor.object_key, ObjectKey::new("mobile/LAB_RESULT/bbb"));
}

/// Verifies paging uploads every submission exactly once.
#[test]
fn paging_covers_each_submission_once() {
    let mut config = sample_config();
    config.max_upload_batch_size = 2;
    let ledger = InMemoryLedger::new();
    let uploader = SpyUploader::new();
    let controller = UploadController::new(
        config,
        store_with(&[
            ("mobile/LAB_RESULT/aaa", SUBMITTED),
            ("mobile/LAB_RESULT/bbb", SUBMITTED + 60),
            ("mobile/LAB_RESULT/ccc", SUBMITTED + 120),
            ("mobile/LAB_RESULT/ddd", SUBMITTED + 180),
            ("mobile/LAB_RESULT/eee", SUBMITTED + 240),
        ]),
        ledger.clone(),
        StaticSigner,
        uploader.clone(),
        FixedClock::new(Timestamp::from_unix_seconds(NOW)),
        RecordingEvents::new(),
    )
    .unwrap();

    let summary = controller.run().unwrap();

    assert_eq!(summary.outcome, RunOutcome::Drained);
    assert_eq!(summary.batches_sent, 3);
    let total: usize =
        uploader.captured().iter().map(|batch| decoded_payload(batch).len()).sum();
    assert_eq!(total, 5);
}

/// Verifies equal-timestamp submissions split across pages are neither
/// skipped nor resent.
#[test]
fn equal_timestamps_page_by_object_key() {
    let mut config = sample_config();
    config.max_upload_batch_size = 1;
    let ledger = InMemoryLedger::new();
    let uploader = SpyUploader::new();
    let controller = UploadController::new(
        config,
        store_with(&[
            ("mobile/LAB_RESULT/aaa", SUBMITTED),
            ("mobile/LAB_RESULT/bbb", SUBMITTED),
            ("mobile/LAB_RESULT/ccc", SUBMITTED),
        ]),
        ledger.clone(),
        StaticSigner,
        uploader.clone(),
        FixedClock::new(Timestamp::from_unix_seconds(NOW)),
        RecordingEvents::new(),
    )
    .unwrap();

    let summary = controller.run().unwrap();

    assert_eq!(summary.outcome, RunOutcome::Drained);
    assert_eq!(summary.batches_sent, 3);
    assert_eq!(uploader.call_count(), 3);
}

/// Verifies a committed cursor excludes covered submissions on the next run.
#[test]
fn resume_skips_covered_submissions() {
    let ledger = InMemoryLedger::new();
    ledger.seed(
        &table(),
        UploadCursor {
            batch_tag: Some(BatchTag::new("earlier-tag")),
            submitted_at: Timestamp::from_unix_seconds(SUBMITTED + 60),
            object_key: ObjectKey::new("mobile/LAB_RESULT/bbb"),
        },
    );
    let uploader = SpyUploader::new();
    let controller = UploadController::new(
        sample_config(),
        store_with(&[
            ("mobile/LAB_RESULT/aaa", SUBMITTED),
            ("mobile/LAB_RESULT/bbb", SUBMITTED + 60),
            ("mobile/LAB_RESULT/ccc", SUBMITTED + 120),
        ]),
        ledger.clone(),
        StaticSigner,
        uploader.clone(),
        FixedClock::new(Timestamp::from_unix_seconds(NOW)),
        RecordingEvents::new(),
    )
    .unwrap();

    let summary = controller.run().unwrap();

    assert_eq!(summary.batches_sent, 1);
    let uploads = decoded_payload(&uploader.captured()[0]);
    assert_eq!(uploads.len(), 1);
    let cursor = ledger.load(&table()).unwrap().unwrap();
    assert_eq!(cursor.object_key, ObjectKey::new("mobile/LAB_RESULT/ccc"));
}

/// Verifies backfill ignores submissions older than the history horizon.
#[test]
fn backfill_window_excludes_stale_submissions() {
    let stale = NOW - 15 * 86_400;
    let uploader = SpyUploader::new();
    let controller = UploadController::new(
        sample_config(),
        store_with(&[
            ("mobile/LAB_RESULT/old", stale),
            ("mobile/LAB_RESULT/new", SUBMITTED),
        ]),
        InMemoryLedger::new(),
        StaticSigner,
        uploader.clone(),
        FixedClock::new(Timestamp::from_unix_seconds(NOW)),
        RecordingEvents::new(),
    )
    .unwrap();

    controller.run().unwrap();

    let uploads = decoded_payload(&uploader.captured()[0]);
    assert_eq!(uploads.len(), 1);
}

// ============================================================================
// SECTION: Per-Item Skips
// ============================================================================

/// Verifies a malformed submission is skipped without aborting the batch.
#[test]
fn malformed_submission_is_skipped_not_fatal() {
    let store = store_with(&[("mobile/LAB_RESULT/good", SUBMITTED)]);
    store.insert(submission("mobile/LAB_RESULT/bad", SUBMITTED + 60), b"!!".to_vec());
    let events = RecordingEvents::new();
    let uploader = SpyUploader::new();
    let controller = UploadController::new(
        sample_config(),
        store,
        InMemoryLedger::new(),
        StaticSigner,
        uploader.clone(),
        FixedClock::new(Timestamp::from_unix_seconds(NOW)),
        events.clone(),
    )
    .unwrap();

    let summary = controller.run().unwrap();

    assert_eq!(summary.submissions_skipped, 1);
    assert_eq!(summary.batches_sent, 1);
    let uploads = decoded_payload(&uploader.captured()[0]);
    assert_eq!(uploads.len(), 1);
    assert!(events.snapshot().iter().any(|event| matches!(
        event,
        RecordedEvent::SubmissionSkipped { object_key, .. }
            if object_key.as_str() == "mobile/LAB_RESULT/bad"
    )));
}

/// Verifies an all-malformed page advances the cursor without a gateway
/// call.
#[test]
fn all_malformed_page_advances_cursor_without_upload() {
    let store = InMemorySubmissionStore::new();
    store.insert(submission("mobile/LAB_RESULT/bad", SUBMITTED), b"!!".to_vec());
    let ledger = InMemoryLedger::new();
    let uploader = SpyUploader::new();
    let controller = UploadController::new(
        sample_config(),
        store,
        ledger.clone(),
        StaticSigner,
        uploader.clone(),
        FixedClock::new(Timestamp::from_unix_seconds(NOW)),
        RecordingEvents::new(),
    )
    .unwrap();

    let summary = controller.run().unwrap();

    assert_eq!(summary.outcome, RunOutcome::Drained);
    assert_eq!(summary.submissions_skipped, 1);
    assert_eq!(uploader.call_count(), 0);
    let cursor = ledger.load(&table()).unwrap().unwrap();
    assert_eq!(cursor.batch_tag, None);
    assert_eq!(cursor.object_key, ObjectKey::new("mobile/LAB_RESULT/bad"));
}

// ============================================================================
// SECTION: Fatal Failures
// ============================================================================

/// Verifies signing failure aborts before any gateway call.
#[test]
fn signing_failure_aborts_run() {
    let ledger = InMemoryLedger::new();
    let uploader = SpyUploader::new();
    let controller = UploadController::new(
        sample_config(),
        store_with(&[("mobile/LAB_RESULT/abc", SUBMITTED)]),
        ledger.clone(),
        UnavailableSigner,
        uploader.clone(),
        FixedClock::new(Timestamp::from_unix_seconds(NOW)),
        RecordingEvents::new(),
    )
    .unwrap();

    let error = controller.run().unwrap_err();

    assert!(matches!(error, EngineError::SigningUnavailable(_)));
    assert_eq!(uploader.call_count(), 0);
    assert_eq!(ledger.load(&table()).unwrap(), None);
}

/// Verifies a ledger write failure is fatal after the acknowledged page.
#[test]
fn ledger_write_failure_is_fatal() {
    let uploader = SpyUploader::new();
    let controller = UploadController::new(
        sample_config(),
        store_with(&[("mobile/LAB_RESULT/abc", SUBMITTED)]),
        ReadOnlyLedger::default(),
        StaticSigner,
        uploader.clone(),
        FixedClock::new(Timestamp::from_unix_seconds(NOW)),
        RecordingEvents::new(),
    )
    .unwrap();

    let error = controller.run().unwrap_err();

    assert!(matches!(error, EngineError::LedgerWriteFailed(_)));
    assert_eq!(uploader.call_count(), 1);
}

/// Verifies an acknowledged batch whose commit never landed is re-uploaded
/// by the next run: double-accept at the gateway, never data loss.
#[test]
fn uncommitted_acknowledgement_is_reuploaded_next_run() {
    let store = store_with(&[("mobile/LAB_RESULT/abc", SUBMITTED)]);
    let clock = FixedClock::new(Timestamp::from_unix_seconds(NOW));

    // First run: the gateway accepts, then the commit fails to land.
    let first = UploadController::new(
        sample_config(),
        store.clone(),
        ReadOnlyLedger::default(),
        StaticSigner,
        SpyUploader::new(),
        clock,
        RecordingEvents::new(),
    )
    .unwrap();
    first.run().unwrap_err();

    // Next run starts from the unchanged (empty) ledger state.
    let uploader = SpyUploader::new();
    let second = UploadController::new(
        sample_config(),
        store,
        InMemoryLedger::new(),
        StaticSigner,
        uploader.clone(),
        clock,
        RecordingEvents::new(),
    )
    .unwrap();
    let summary = second.run().unwrap();

    assert_eq!(summary.batches_sent, 1);
    let uploads = decoded_payload(&uploader.captured()[0]);
    assert_eq!(uploads.len(), 1);
}

/// Verifies an invalid configuration is rejected at construction.
#[test]
fn invalid_config_is_rejected() {
    let mut config = sample_config();
    config.max_subsequent_batch_upload_count = 0;

    let error = UploadController::new(
        config,
        InMemorySubmissionStore::new(),
        InMemoryLedger::new(),
        StaticSigner,
        SpyUploader::new(),
        FixedClock::new(Timestamp::from_unix_seconds(NOW)),
        RecordingEvents::new(),
    )
    .err();

    assert!(matches!(error, Some(EngineError::InvalidConfig(_))));
}
