// crates/keyfed-providers/src/s3.rs
// ============================================================================
// Module: S3 Submission Store
// Description: S3-backed read-only submission repository.
// Purpose: List and fetch raw key submissions from object storage.
// Dependencies: aws-config, aws-sdk-s3, keyfed-core, tokio
// ============================================================================

//! ## Overview
//! `S3SubmissionStore` exposes an S3 bucket as a [`SubmissionRepository`].
//! The store is a blocking facade over the async AWS SDK: it owns a private
//! multi-thread runtime and blocks the caller on each listing or fetch,
//! matching the engine's synchronous suspension-point model. Listings walk
//! `ListObjectsV2` pages to exhaustion; the eligibility filter is applied
//! locally over object keys and last-modified instants.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use aws_config::BehaviorVersion;
use aws_config::Region;
use aws_sdk_s3::Client;
use keyfed_core::BucketName;
use keyfed_core::ObjectKey;
use keyfed_core::RepositoryError;
use keyfed_core::Submission;
use keyfed_core::SubmissionFilter;
use keyfed_core::SubmissionRepository;
use keyfed_core::Timestamp;
use keyfed_core::sort_by_cursor_position;
use serde::Deserialize;
use tokio::runtime::Runtime;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum accepted size of one submission object.
const MAX_OBJECT_BYTES: usize = 1024 * 1024;

// ============================================================================
// SECTION: Config
// ============================================================================

/// Configuration for the S3-backed submission store.
#[derive(Debug, Clone, Deserialize)]
pub struct S3SubmissionStoreConfig {
    /// Bucket holding raw key submissions.
    pub bucket: String,
    /// AWS region (optional; falls back to environment configuration).
    #[serde(default)]
    pub region: Option<String>,
    /// Custom endpoint URL (for S3-compatible stores).
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Force path-style addressing (for S3-compatible stores).
    #[serde(default)]
    pub force_path_style: bool,
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// S3-backed read-only submission repository.
pub struct S3SubmissionStore {
    /// S3 client handle.
    client: Client,
    /// Bucket holding submissions.
    bucket: BucketName,
    /// Tokio runtime for blocking S3 calls.
    runtime: Option<Arc<Runtime>>,
}

impl Drop for S3SubmissionStore {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            let _ = std::thread::spawn(move || drop(runtime));
        }
    }
}

impl S3SubmissionStore {
    /// Creates a new S3 submission store.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] when the bucket is unset or the runtime
    /// cannot be built.
    pub fn new(config: S3SubmissionStoreConfig) -> Result<Self, RepositoryError> {
        if config.bucket.trim().is_empty() {
            return Err(RepositoryError::Invalid("bucket must be set".to_string()));
        }
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|err| RepositoryError::Io(err.to_string()))?;
        let shared_config = runtime.block_on(async {
            let mut loader = aws_config::defaults(BehaviorVersion::latest());
            if let Some(region) = &config.region {
                loader = loader.region(Region::new(region.clone()));
            }
            if let Some(endpoint) = &config.endpoint {
                loader = loader.endpoint_url(endpoint);
            }
            loader.load().await
        });
        let mut s3_builder = aws_sdk_s3::config::Builder::from(&shared_config);
        if config.force_path_style {
            s3_builder = s3_builder.force_path_style(true);
        }
        let client = Client::from_conf(s3_builder.build());
        Ok(Self {
            client,
            bucket: BucketName::new(config.bucket),
            runtime: Some(Arc::new(runtime)),
        })
    }

    /// Returns the runtime handle or fails when the store is closed.
    fn runtime(&self) -> Result<&Runtime, RepositoryError> {
        self.runtime
            .as_deref()
            .ok_or_else(|| RepositoryError::Io("submission store closed".to_string()))
    }

    /// Lists one key prefix to exhaustion.
    fn list_prefix(
        &self,
        prefix: Option<&str>,
        filter: &SubmissionFilter,
        into: &mut Vec<Submission>,
    ) -> Result<(), RepositoryError> {
        let runtime = self.runtime()?;
        let mut continuation: Option<String> = None;
        loop {
            let bucket = self.bucket.clone();
            let client = self.client.clone();
            let token = continuation.clone();
            let page = runtime
                .block_on(async {
                    let mut request = client.list_objects_v2().bucket(bucket.as_str());
                    if let Some(prefix) = prefix {
                        request = request.prefix(prefix);
                    }
                    if let Some(token) = token {
                        request = request.continuation_token(token);
                    }
                    request.send().await
                })
                .map_err(|err| RepositoryError::Io(err.to_string()))?;
            for object in page.contents() {
                let Some(key) = object.key() else {
                    continue;
                };
                let Some(last_modified) = object.last_modified() else {
                    continue;
                };
                let submission = Submission {
                    bucket: self.bucket.clone(),
                    object_key: ObjectKey::new(key),
                    submitted_at: Timestamp::from_unix_seconds(last_modified.secs()),
                };
                if filter.admits(&submission) {
                    into.push(submission);
                }
            }
            match page.next_continuation_token() {
                Some(token) => continuation = Some(token.to_string()),
                None => break,
            }
        }
        Ok(())
    }
}

impl SubmissionRepository for S3SubmissionStore {
    fn list(&self, filter: &SubmissionFilter) -> Result<Vec<Submission>, RepositoryError> {
        let mut listed = Vec::new();
        if filter.prefixes.is_empty() {
            self.list_prefix(None, filter, &mut listed)?;
        } else {
            for prefix in &filter.prefixes {
                self.list_prefix(Some(prefix), filter, &mut listed)?;
            }
        }
        sort_by_cursor_position(&mut listed);
        Ok(listed)
    }

    fn fetch(&self, submission: &Submission) -> Result<Vec<u8>, RepositoryError> {
        let runtime = self.runtime()?;
        let client = self.client.clone();
        let bucket = self.bucket.clone();
        let key = submission.object_key.clone();
        let bytes = runtime.block_on(async {
            let response = client
                .get_object()
                .bucket(bucket.as_str())
                .key(key.as_str())
                .send()
                .await
                .map_err(|err| RepositoryError::NotFound(err.to_string()))?;
            response
                .body
                .collect()
                .await
                .map(|data| data.into_bytes().to_vec())
                .map_err(|err| RepositoryError::Io(err.to_string()))
        })?;
        if bytes.len() > MAX_OBJECT_BYTES {
            return Err(RepositoryError::Invalid(format!(
                "submission object {} exceeds size limit",
                submission.object_key.as_str()
            )));
        }
        Ok(bytes)
    }
}
