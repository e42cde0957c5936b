// crates/keyfed-core/src/events.rs
// ============================================================================
// Module: Keyfed Upload Events
// Description: Observability hooks for upload synchronization runs.
// Purpose: Surface run progress without binding a logging framework.
// Dependencies: crate::{core, runtime}, serde_json
// ============================================================================

//! ## Overview
//! This module exposes a thin event interface for run progress: start,
//! per-batch acknowledgements, per-item skips, and terminal outcomes. It is
//! intentionally dependency-light so deployments can plug in their own
//! logging or metrics backends without redesign. Event payloads never carry
//! key material or credentials.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::sync::Arc;
use std::sync::Mutex;

use serde_json::json;

use crate::core::identifiers::BatchTag;
use crate::core::identifiers::ObjectKey;
use crate::core::submission::SubmissionWindow;
use crate::runtime::assembler::AssembleError;
use crate::runtime::engine::EngineError;
use crate::runtime::engine::RunSummary;

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Event sink for upload synchronization runs.
pub trait UploadEvents {
    /// Records that an enabled run resolved its eligibility window.
    fn run_started(&self, window: &SubmissionWindow);
    /// Records a gateway-acknowledged batch.
    fn batch_uploaded(&self, tag: &BatchTag, exposures_sent: usize, inserted: u64);
    /// Records a malformed submission skipped from the current page.
    fn submission_skipped(&self, object_key: &ObjectKey, reason: &AssembleError);
    /// Records a successful terminal state.
    fn run_completed(&self, summary: &RunSummary);
    /// Records a fatal terminal state.
    fn run_failed(&self, error: &EngineError);
}

impl<T: UploadEvents + ?Sized> UploadEvents for Box<T> {
    fn run_started(&self, window: &SubmissionWindow) {
        (**self).run_started(window);
    }

    fn batch_uploaded(&self, tag: &BatchTag, exposures_sent: usize, inserted: u64) {
        (**self).batch_uploaded(tag, exposures_sent, inserted);
    }

    fn submission_skipped(&self, object_key: &ObjectKey, reason: &AssembleError) {
        (**self).submission_skipped(object_key, reason);
    }

    fn run_completed(&self, summary: &RunSummary) {
        (**self).run_completed(summary);
    }

    fn run_failed(&self, error: &EngineError) {
        (**self).run_failed(error);
    }
}

// ============================================================================
// SECTION: No-op Sink
// ============================================================================

/// Event sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEvents;

impl UploadEvents for NoopEvents {
    fn run_started(&self, _window: &SubmissionWindow) {}

    fn batch_uploaded(&self, _tag: &BatchTag, _exposures_sent: usize, _inserted: u64) {}

    fn submission_skipped(&self, _object_key: &ObjectKey, _reason: &AssembleError) {}

    fn run_completed(&self, _summary: &RunSummary) {}

    fn run_failed(&self, _error: &EngineError) {}
}

// ============================================================================
// SECTION: JSON Lines Sink
// ============================================================================

/// Event sink writing one JSON object per line.
///
/// Writes are best effort: an unwritable sink never interrupts a run.
pub struct JsonLinesEvents<W: Write + Send> {
    /// Output writer for event records.
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesEvents<W> {
    /// Creates a JSON-lines event sink over the given writer.
    pub const fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Writes one event record followed by a newline.
    fn write_record(&self, record: &serde_json::Value) {
        let Ok(mut guard) = self.writer.lock() else {
            return;
        };
        if serde_json::to_writer(&mut *guard, record).is_ok() {
            let _ = guard.write_all(b"\n");
        }
    }
}

impl<W: Write + Send> UploadEvents for JsonLinesEvents<W> {
    fn run_started(&self, window: &SubmissionWindow) {
        self.write_record(&json!({
            "event": "run_started",
            "window": window,
        }));
    }

    fn batch_uploaded(&self, tag: &BatchTag, exposures_sent: usize, inserted: u64) {
        self.write_record(&json!({
            "event": "batch_uploaded",
            "batch_tag": tag,
            "exposures_sent": exposures_sent,
            "inserted_exposures": inserted,
        }));
    }

    fn submission_skipped(&self, object_key: &ObjectKey, reason: &AssembleError) {
        self.write_record(&json!({
            "event": "submission_skipped",
            "object_key": object_key,
            "reason": reason.to_string(),
        }));
    }

    fn run_completed(&self, summary: &RunSummary) {
        self.write_record(&json!({
            "event": "run_completed",
            "summary": summary,
        }));
    }

    fn run_failed(&self, error: &EngineError) {
        self.write_record(&json!({
            "event": "run_failed",
            "error": error.to_string(),
        }));
    }
}

// ============================================================================
// SECTION: Recording Sink
// ============================================================================

/// Event captured by [`RecordingEvents`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedEvent {
    /// Run resolved its window.
    RunStarted {
        /// Resolved eligibility window.
        window: SubmissionWindow,
    },
    /// Batch acknowledged by the gateway.
    BatchUploaded {
        /// Acknowledgement tag.
        tag: BatchTag,
        /// Exposures sent in the batch.
        exposures_sent: usize,
        /// Exposures the gateway inserted.
        inserted: u64,
    },
    /// Submission skipped as malformed.
    SubmissionSkipped {
        /// Key of the skipped object.
        object_key: ObjectKey,
        /// Rendered skip reason.
        reason: String,
    },
    /// Run completed successfully.
    RunCompleted {
        /// Terminal summary.
        summary: RunSummary,
    },
    /// Run failed fatally.
    RunFailed {
        /// Rendered error.
        error: String,
    },
}

/// Event sink capturing every event for test assertions.
///
/// Clones share one capture buffer, so a test can keep a handle while the
/// controller owns its clone.
#[derive(Debug, Clone, Default)]
pub struct RecordingEvents {
    /// Captured events in emission order.
    events: Arc<Mutex<Vec<RecordedEvent>>>,
}

impl RecordingEvents {
    /// Creates an empty recording sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the captured events.
    #[must_use]
    pub fn snapshot(&self) -> Vec<RecordedEvent> {
        self.events.lock().map_or_else(|_| Vec::new(), |guard| guard.clone())
    }

    /// Appends one captured event.
    fn record(&self, event: RecordedEvent) {
        if let Ok(mut guard) = self.events.lock() {
            guard.push(event);
        }
    }
}

impl UploadEvents for RecordingEvents {
    fn run_started(&self, window: &SubmissionWindow) {
        self.record(RecordedEvent::RunStarted {
            window: window.clone(),
        });
    }

    fn batch_uploaded(&self, tag: &BatchTag, exposures_sent: usize, inserted: u64) {
        self.record(RecordedEvent::BatchUploaded {
            tag: tag.clone(),
            exposures_sent,
            inserted,
        });
    }

    fn submission_skipped(&self, object_key: &ObjectKey, reason: &AssembleError) {
        self.record(RecordedEvent::SubmissionSkipped {
            object_key: object_key.clone(),
            reason: reason.to_string(),
        });
    }

    fn run_completed(&self, summary: &RunSummary) {
        self.record(RecordedEvent::RunCompleted {
            summary: *summary,
        });
    }

    fn run_failed(&self, error: &EngineError) {
        self.record(RecordedEvent::RunFailed {
            error: error.to_string(),
        });
    }
}
