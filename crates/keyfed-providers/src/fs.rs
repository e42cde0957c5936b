// crates/keyfed-providers/src/fs.rs
// ============================================================================
// Module: Directory Submission Store
// Description: Local directory tree as a read-only submission repository.
// Purpose: Back operational testing and development without object storage.
// Dependencies: keyfed-core, std
// ============================================================================

//! ## Overview
//! `DirSubmissionStore` maps a local directory tree onto the submission
//! repository contract: the relative file path (with `/` separators) is the
//! object key and the file modification time is the submission instant.
//! Reads are rooted; paths escaping the configured root fail closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::io::ErrorKind;
use std::io::Read;
use std::path::Path;
use std::path::PathBuf;
use std::time::UNIX_EPOCH;

use keyfed_core::BucketName;
use keyfed_core::ObjectKey;
use keyfed_core::RepositoryError;
use keyfed_core::Submission;
use keyfed_core::SubmissionFilter;
use keyfed_core::SubmissionRepository;
use keyfed_core::Timestamp;
use keyfed_core::sort_by_cursor_position;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum accepted size of one submission file.
const MAX_OBJECT_BYTES: usize = 1024 * 1024;

// ============================================================================
// SECTION: Store
// ============================================================================

/// Directory-backed read-only submission repository.
#[derive(Debug, Clone)]
pub struct DirSubmissionStore {
    /// Root directory holding submission files.
    root: PathBuf,
    /// Bucket label reported on listed submissions.
    bucket: BucketName,
}

impl DirSubmissionStore {
    /// Creates a store rooted at the given directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, bucket: BucketName) -> Self {
        Self {
            root: root.into(),
            bucket,
        }
    }

    /// Walks the tree under `dir`, appending admitted submissions.
    fn walk(
        &self,
        dir: &Path,
        filter: &SubmissionFilter,
        into: &mut Vec<Submission>,
    ) -> Result<(), RepositoryError> {
        let entries = fs::read_dir(dir).map_err(|err| RepositoryError::Io(err.to_string()))?;
        for entry in entries {
            let entry = entry.map_err(|err| RepositoryError::Io(err.to_string()))?;
            let path = entry.path();
            if path.is_dir() {
                self.walk(&path, filter, into)?;
                continue;
            }
            let Some(key) = relative_key(&self.root, &path) else {
                continue;
            };
            let metadata =
                entry.metadata().map_err(|err| RepositoryError::Io(err.to_string()))?;
            let submitted_at = modified_timestamp(&metadata)?;
            let submission = Submission {
                bucket: self.bucket.clone(),
                object_key: ObjectKey::new(key),
                submitted_at,
            };
            if filter.admits(&submission) {
                into.push(submission);
            }
        }
        Ok(())
    }

    /// Resolves an object key into a rooted file path.
    fn resolve(&self, key: &ObjectKey) -> Result<PathBuf, RepositoryError> {
        let path = self.root.join(key.as_str());
        let root = fs::canonicalize(&self.root)
            .map_err(|err| RepositoryError::Io(err.to_string()))?;
        let resolved = fs::canonicalize(&path).map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                RepositoryError::NotFound(key.as_str().to_string())
            } else {
                RepositoryError::Io(err.to_string())
            }
        })?;
        if !resolved.starts_with(&root) {
            return Err(RepositoryError::Invalid(
                "submission path escapes configured root".to_string(),
            ));
        }
        Ok(resolved)
    }
}

impl SubmissionRepository for DirSubmissionStore {
    fn list(&self, filter: &SubmissionFilter) -> Result<Vec<Submission>, RepositoryError> {
        let mut listed = Vec::new();
        self.walk(&self.root, filter, &mut listed)?;
        sort_by_cursor_position(&mut listed);
        Ok(listed)
    }

    fn fetch(&self, submission: &Submission) -> Result<Vec<u8>, RepositoryError> {
        let path = self.resolve(&submission.object_key)?;
        let file = fs::File::open(&path).map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                RepositoryError::NotFound(submission.object_key.as_str().to_string())
            } else {
                RepositoryError::Io(err.to_string())
            }
        })?;
        let mut limited = file.take(MAX_OBJECT_BYTES as u64 + 1);
        let mut bytes = Vec::new();
        limited.read_to_end(&mut bytes).map_err(|err| RepositoryError::Io(err.to_string()))?;
        if bytes.len() > MAX_OBJECT_BYTES {
            return Err(RepositoryError::Invalid(format!(
                "submission file {} exceeds size limit",
                submission.object_key.as_str()
            )));
        }
        Ok(bytes)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the `/`-separated key of `path` relative to `root`.
fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let mut key = String::new();
    for component in relative.components() {
        if !key.is_empty() {
            key.push('/');
        }
        key.push_str(&component.as_os_str().to_string_lossy());
    }
    if key.is_empty() { None } else { Some(key) }
}

/// Returns the file modification time as a [`Timestamp`].
fn modified_timestamp(metadata: &fs::Metadata) -> Result<Timestamp, RepositoryError> {
    let modified = metadata.modified().map_err(|err| RepositoryError::Io(err.to_string()))?;
    let seconds = modified
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX));
    Ok(Timestamp::from_unix_seconds(seconds))
}
