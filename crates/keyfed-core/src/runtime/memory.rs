// crates/keyfed-core/src/runtime/memory.rs
// ============================================================================
// Module: Keyfed In-Memory Collaborators
// Description: In-memory submission store and cursor ledger.
// Purpose: Back tests and local development without external services.
// Dependencies: crate::{core, interfaces}, std
// ============================================================================

//! ## Overview
//! In-memory implementations of the submission repository and batch tag
//! ledger. Clones share state through an inner `Arc`, so a test can keep a
//! handle for assertions while the controller owns its clone.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;

use crate::core::identifiers::StateTableKey;
use crate::core::submission::Submission;
use crate::core::submission::SubmissionFilter;
use crate::core::submission::UploadCursor;
use crate::core::submission::sort_by_cursor_position;
use crate::interfaces::BatchTagLedger;
use crate::interfaces::LedgerError;
use crate::interfaces::RepositoryError;
use crate::interfaces::SubmissionRepository;

// ============================================================================
// SECTION: In-Memory Submission Store
// ============================================================================

/// In-memory [`SubmissionRepository`].
#[derive(Debug, Clone, Default)]
pub struct InMemorySubmissionStore {
    /// Stored objects keyed by object key string.
    objects: Arc<Mutex<BTreeMap<String, (Submission, Vec<u8>)>>>,
}

impl InMemorySubmissionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts one submission object with its content bytes.
    pub fn insert(&self, submission: Submission, content: impl Into<Vec<u8>>) {
        if let Ok(mut guard) = self.objects.lock() {
            guard.insert(submission.object_key.as_str().to_string(), (submission, content.into()));
        }
    }
}

impl SubmissionRepository for InMemorySubmissionStore {
    fn list(&self, filter: &SubmissionFilter) -> Result<Vec<Submission>, RepositoryError> {
        let guard =
            self.objects.lock().map_err(|_| RepositoryError::Io("store poisoned".to_string()))?;
        let mut listed: Vec<Submission> = guard
            .values()
            .map(|(submission, _)| submission.clone())
            .filter(|submission| filter.admits(submission))
            .collect();
        drop(guard);
        sort_by_cursor_position(&mut listed);
        Ok(listed)
    }

    fn fetch(&self, submission: &Submission) -> Result<Vec<u8>, RepositoryError> {
        let guard =
            self.objects.lock().map_err(|_| RepositoryError::Io("store poisoned".to_string()))?;
        guard.get(submission.object_key.as_str()).map(|(_, content)| content.clone()).ok_or_else(
            || RepositoryError::NotFound(submission.object_key.as_str().to_string()),
        )
    }
}

// ============================================================================
// SECTION: In-Memory Ledger
// ============================================================================

/// In-memory [`BatchTagLedger`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    /// Committed cursors keyed by state table key.
    cursors: Arc<Mutex<BTreeMap<String, UploadCursor>>>,
}

impl InMemoryLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the ledger with a committed cursor.
    pub fn seed(&self, table: &StateTableKey, cursor: UploadCursor) {
        if let Ok(mut guard) = self.cursors.lock() {
            guard.insert(table.as_str().to_string(), cursor);
        }
    }
}

impl BatchTagLedger for InMemoryLedger {
    fn load(&self, table: &StateTableKey) -> Result<Option<UploadCursor>, LedgerError> {
        let guard =
            self.cursors.lock().map_err(|_| LedgerError::Store("ledger poisoned".to_string()))?;
        Ok(guard.get(table.as_str()).cloned())
    }

    fn commit(&self, table: &StateTableKey, cursor: &UploadCursor) -> Result<(), LedgerError> {
        let mut guard =
            self.cursors.lock().map_err(|_| LedgerError::Store("ledger poisoned".to_string()))?;
        guard.insert(table.as_str().to_string(), cursor.clone());
        Ok(())
    }
}
