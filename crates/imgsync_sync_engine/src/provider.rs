//! Upload and URL provider abstraction.

use crate::error::{SyncError, SyncResult};
use chrono::{DateTime, Utc};
use imgsync_core::{SyncConfig, UploadOutcome};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Limits the provider must apply to an upload, taken from [`SyncConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct UploadOptions {
    /// Largest accepted image in bytes.
    pub max_file_size_bytes: u64,
    /// Accepted MIME types.
    pub allowed_content_types: Vec<String>,
    /// Quality hint for the provider's encoder.
    pub compression_quality: f32,
}

impl UploadOptions {
    /// Copies the upload limits out of `config`.
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            max_file_size_bytes: config.max_file_size_bytes,
            allowed_content_types: config.allowed_content_types.clone(),
            compression_quality: config.compression_quality,
        }
    }

    /// Checks an image against the limits.
    ///
    /// # Errors
    ///
    /// Returns a provider error naming the violated limit.
    pub fn check(&self, content_type: &str, size: u64) -> SyncResult<()> {
        if !self
            .allowed_content_types
            .iter()
            .any(|t| t.eq_ignore_ascii_case(content_type))
        {
            return Err(SyncError::provider(format!(
                "content type {content_type} is not allowed"
            )));
        }
        if size > self.max_file_size_bytes {
            return Err(SyncError::provider(format!(
                "file is {size} bytes, the limit is {}",
                self.max_file_size_bytes
            )));
        }
        Ok(())
    }
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self::from_config(&SyncConfig::default())
    }
}

/// One image to upload.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadRequest {
    /// Local file reference.
    pub local_ref: String,
    /// Owning recipe id.
    pub owner_id: String,
    /// Limits to enforce.
    pub options: UploadOptions,
}

impl UploadRequest {
    /// Creates an upload request.
    pub fn new(local_ref: impl Into<String>, owner_id: impl Into<String>, options: UploadOptions) -> Self {
        Self {
            local_ref: local_ref.into(),
            owner_id: owner_id.into(),
            options,
        }
    }
}

/// A fetchable URL for an uploaded image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteUrl {
    /// The URL.
    pub url: String,
    /// When the remote store stops honoring the URL, if it says.
    pub expires_at: Option<DateTime<Utc>>,
}

impl RemoteUrl {
    /// Creates a URL without a known expiry.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            expires_at: None,
        }
    }
}

/// The remote object store, seen from the sync engine.
///
/// Implementations own network access, compression and authentication. A
/// failure should come back as [`SyncError::Provider`] carrying a message
/// fit to store on the sync record.
pub trait ImageProvider: Send + Sync {
    /// Uploads one image and reports the name the store gave it.
    fn upload_image(
        &self,
        request: &UploadRequest,
    ) -> impl Future<Output = SyncResult<UploadOutcome>> + Send;

    /// Resolves an uploaded image to a fetchable URL.
    fn get_remote_url(&self, remote_name: &str)
        -> impl Future<Output = SyncResult<RemoteUrl>> + Send;
}

impl<P: ImageProvider> ImageProvider for Arc<P> {
    fn upload_image(
        &self,
        request: &UploadRequest,
    ) -> impl Future<Output = SyncResult<UploadOutcome>> + Send {
        (**self).upload_image(request)
    }

    fn get_remote_url(
        &self,
        remote_name: &str,
    ) -> impl Future<Output = SyncResult<RemoteUrl>> + Send {
        (**self).get_remote_url(remote_name)
    }
}

/// One recorded call to [`MockProvider::upload_image`].
#[derive(Debug, Clone)]
pub struct UploadCall {
    /// Local file reference uploaded.
    pub local_ref: String,
    /// Owning recipe id.
    pub owner_id: String,
    /// When the call started.
    pub started_at: tokio::time::Instant,
}

#[derive(Debug)]
struct MockState {
    upload_failure: Option<String>,
    failing_refs: HashMap<String, String>,
    url_failure: Option<String>,
    file_size: u64,
    content_type: String,
    url_base: String,
    latency: Duration,
    next_id: u64,
    uploads: Vec<UploadCall>,
    url_fetches: Vec<String>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            upload_failure: None,
            failing_refs: HashMap::new(),
            url_failure: None,
            file_size: 2048,
            content_type: "image/jpeg".into(),
            url_base: "https://storage.example.com/images".into(),
            latency: Duration::ZERO,
            next_id: 0,
            uploads: Vec::new(),
            url_fetches: Vec::new(),
        }
    }
}

/// A scriptable provider for testing.
///
/// Uploads succeed by default, naming `local://dir/a.jpg` as `a_<n>.jpg`
/// where `n` counts successful uploads from 1. Every call is logged with its
/// start time so tests can check batching and pacing.
#[derive(Debug, Default)]
pub struct MockProvider {
    state: Mutex<MockState>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockProvider {
    /// Creates a provider whose calls all succeed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every upload fail with `message`.
    pub fn fail_uploads_with(&self, message: impl Into<String>) {
        self.state.lock().upload_failure = Some(message.into());
    }

    /// Makes uploads of `local_ref` fail with `message`.
    pub fn fail_upload_for(&self, local_ref: impl Into<String>, message: impl Into<String>) {
        self.state
            .lock()
            .failing_refs
            .insert(local_ref.into(), message.into());
    }

    /// Clears all upload failures.
    pub fn succeed_uploads(&self) {
        let mut state = self.state.lock();
        state.upload_failure = None;
        state.failing_refs.clear();
    }

    /// Makes every URL fetch fail with `message`.
    pub fn fail_url_fetch_with(&self, message: impl Into<String>) {
        self.state.lock().url_failure = Some(message.into());
    }

    /// Clears the URL fetch failure.
    pub fn succeed_url_fetch(&self) {
        self.state.lock().url_failure = None;
    }

    /// Sets the size and type every upload reports.
    pub fn set_upload_metadata(&self, file_size: u64, content_type: impl Into<String>) {
        let mut state = self.state.lock();
        state.file_size = file_size;
        state.content_type = content_type.into();
    }

    /// Makes each upload take `latency` (tokio time).
    pub fn set_latency(&self, latency: Duration) {
        self.state.lock().latency = latency;
    }

    /// Returns every upload call so far.
    pub fn upload_calls(&self) -> Vec<UploadCall> {
        self.state.lock().uploads.clone()
    }

    /// Returns the number of upload calls so far.
    pub fn upload_count(&self) -> usize {
        self.state.lock().uploads.len()
    }

    /// Returns the remote names passed to URL fetches so far.
    pub fn url_fetches(&self) -> Vec<String> {
        self.state.lock().url_fetches.clone()
    }

    /// Returns the most uploads that were ever running at once.
    pub fn peak_concurrency(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn remote_name_for(local_ref: &str, id: u64) -> String {
        let file = local_ref.rsplit('/').next().unwrap_or(local_ref);
        match file.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => format!("{stem}_{id}.{ext}"),
            _ => format!("{file}_{id}"),
        }
    }
}

impl ImageProvider for MockProvider {
    async fn upload_image(&self, request: &UploadRequest) -> SyncResult<UploadOutcome> {
        let latency = {
            let mut state = self.state.lock();
            state.uploads.push(UploadCall {
                local_ref: request.local_ref.clone(),
                owner_id: request.owner_id.clone(),
                started_at: tokio::time::Instant::now(),
            });
            state.latency
        };

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let mut state = self.state.lock();
        if let Some(message) = state.failing_refs.get(&request.local_ref) {
            return Err(SyncError::provider(message.clone()));
        }
        if let Some(message) = &state.upload_failure {
            return Err(SyncError::provider(message.clone()));
        }
        request.options.check(&state.content_type, state.file_size)?;

        state.next_id += 1;
        Ok(UploadOutcome {
            remote_name: Self::remote_name_for(&request.local_ref, state.next_id),
            file_size: Some(state.file_size),
            content_type: Some(state.content_type.clone()),
        })
    }

    async fn get_remote_url(&self, remote_name: &str) -> SyncResult<RemoteUrl> {
        let mut state = self.state.lock();
        state.url_fetches.push(remote_name.to_string());
        if let Some(message) = &state.url_failure {
            return Err(SyncError::provider(message.clone()));
        }
        Ok(RemoteUrl::new(format!("{}/{remote_name}", state.url_base)))
    }
}
