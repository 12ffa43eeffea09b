//! The sync orchestrator: per-image state machine and batch scheduler.

use crate::backoff::{BackoffPolicy, ConstantBackoff};
use crate::error::{SyncError, SyncResult};
use crate::provider::{ImageProvider, UploadOptions, UploadRequest};
use futures::future::join_all;
use imgsync_core::{
    aggregate_status, require_id, Clock, ConfigManager, SharedConfig, SyncConfig, SyncRecord,
    SyncRecordStore, SyncStatus, SystemClock, UrlCache, BATCH_SIZE_RANGE,
};
use imgsync_storage::KeyValueStore;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Counters kept by the orchestrator since it was created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Provider uploads started.
    pub uploads_attempted: u64,
    /// Provider uploads that succeeded.
    pub uploads_succeeded: u64,
    /// Provider uploads that failed.
    pub uploads_failed: u64,
    /// `sync_image` calls answered from an already-synced record.
    pub already_synced: u64,
    /// URL lookups served from the cache.
    pub url_cache_hits: u64,
    /// URL lookups that went to the provider.
    pub url_cache_misses: u64,
    /// Batch operations completed.
    pub batches_run: u64,
    /// Last upload error message.
    pub last_error: Option<String>,
}

/// Outcome of a batch operation.
///
/// Per-image failures are recorded on their sync records and counted here;
/// they do not fail the batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Records that matched the batch filter.
    pub eligible: usize,
    /// Records processed.
    pub attempted: usize,
    /// Records that ended synced.
    pub succeeded: usize,
    /// Records whose attempt failed.
    pub failed: usize,
    /// Chunks run.
    pub chunks: usize,
}

impl BatchReport {
    /// Returns true if nothing in the batch failed.
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

/// Drives images from local capture to remote storage.
///
/// Each image moves through Pending → Syncing → Synced | Failed, with every
/// transition persisted before the next provider call. Batch operations
/// (`retry_failed_syncs`, `sync_pending_images`) are single-flight: a second
/// call waits for the first to finish instead of interleaving with it.
///
/// # Example
///
/// ```rust,ignore
/// let engine = SyncOrchestrator::new(SyncConfig::default(), provider, Arc::new(store))?;
/// let remote_name = engine.sync_image("local://a.jpg", "recipe-1").await?;
/// let url = engine.get_image_url(&remote_name).await?;
/// ```
pub struct SyncOrchestrator<P, S, C = SystemClock> {
    provider: P,
    records: SyncRecordStore<S>,
    cache: UrlCache<S, C>,
    config: SharedConfig,
    clock: C,
    backoff: Box<dyn BackoffPolicy>,
    batch_lock: tokio::sync::Mutex<()>,
    stats: RwLock<EngineStats>,
}

impl<P: ImageProvider, S: KeyValueStore> SyncOrchestrator<P, S, SystemClock> {
    /// Creates an orchestrator with its own config manager.
    ///
    /// Legacy record arrays found in `storage` are migrated before returning.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` is invalid or the migration cannot read
    /// storage.
    pub fn new(config: SyncConfig, provider: P, storage: Arc<S>) -> SyncResult<Self> {
        let config = ConfigManager::shared(config)?;
        Self::with_shared_config(config, provider, storage)
    }

    /// Creates an orchestrator that reads tunables from a shared manager.
    ///
    /// # Errors
    ///
    /// Returns an error if the legacy migration cannot read storage.
    pub fn with_shared_config(
        config: SharedConfig,
        provider: P,
        storage: Arc<S>,
    ) -> SyncResult<Self> {
        Self::with_clock(config, provider, storage, SystemClock)
    }
}

impl<P: ImageProvider, S: KeyValueStore, C: Clock + Clone> SyncOrchestrator<P, S, C> {
    /// Creates an orchestrator with an explicit time source.
    ///
    /// # Errors
    ///
    /// Returns an error if the legacy migration cannot read storage.
    pub fn with_clock(
        config: SharedConfig,
        provider: P,
        storage: Arc<S>,
        clock: C,
    ) -> SyncResult<Self> {
        let records = SyncRecordStore::open(Arc::clone(&storage))?;
        let cache = UrlCache::new(storage, Arc::clone(&config), clock.clone());
        Ok(Self {
            provider,
            records,
            cache,
            config,
            clock,
            backoff: Box::new(ConstantBackoff),
            batch_lock: tokio::sync::Mutex::new(()),
            stats: RwLock::new(EngineStats::default()),
        })
    }

    /// Replaces the pacing policy used between batch chunks.
    #[must_use]
    pub fn with_backoff(mut self, backoff: impl BackoffPolicy + 'static) -> Self {
        self.backoff = Box::new(backoff);
        self
    }

    /// Uploads one image and returns its remote name.
    ///
    /// An image that is already synced returns its stored name without
    /// touching the provider. Otherwise the attempt is persisted as in
    /// flight, the provider is called, and the outcome is persisted. After a
    /// successful upload the remote URL is fetched into the cache; a failure
    /// there is logged and ignored.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Validation`] for an empty argument, the
    /// provider's error if the upload fails, or a storage error.
    pub async fn sync_image(&self, local_ref: &str, owner_id: &str) -> SyncResult<String> {
        require_id("localRef", local_ref)?;
        require_id("ownerId", owner_id)?;
        let options = UploadOptions::from_config(&self.config.get());
        self.sync_one(local_ref, owner_id, &options).await
    }

    async fn sync_one(
        &self,
        local_ref: &str,
        owner_id: &str,
        options: &UploadOptions,
    ) -> SyncResult<String> {
        let existing = self.records.get(local_ref)?;
        if let Some(name) = existing
            .as_ref()
            .filter(|r| r.is_synced)
            .and_then(|r| r.remote_name.clone())
        {
            debug!(local_ref, remote_name = %name, "image already synced");
            self.stats.write().already_synced += 1;
            return Ok(name);
        }

        let mut record = existing.unwrap_or_else(|| SyncRecord::new(local_ref, owner_id));
        record.begin_attempt(self.clock.now());
        self.records.upsert(&record)?;
        self.stats.write().uploads_attempted += 1;
        debug!(local_ref, owner_id = %record.owner_id, attempt = record.retry_count, "uploading image");

        let request = UploadRequest::new(local_ref, record.owner_id.clone(), options.clone());
        match self.provider.upload_image(&request).await {
            Ok(outcome) => {
                let remote_name = outcome.remote_name.clone();
                record.mark_synced(outcome, self.clock.now());
                self.records.upsert(&record)?;
                self.stats.write().uploads_succeeded += 1;
                debug!(local_ref, remote_name = %remote_name, "image synced");

                self.prefetch_url(&remote_name).await;
                Ok(remote_name)
            }
            Err(e) => {
                let message = e.to_string();
                record.mark_failed(message.clone());
                self.records.upsert(&record)?;
                {
                    let mut stats = self.stats.write();
                    stats.uploads_failed += 1;
                    stats.last_error = Some(message);
                }
                warn!(local_ref, attempt = record.retry_count, error = %e, "image upload failed");
                Err(e)
            }
        }
    }

    async fn prefetch_url(&self, remote_name: &str) {
        match self.provider.get_remote_url(remote_name).await {
            Ok(remote) => {
                if let Err(e) = self.cache.put(remote_name, &remote.url) {
                    warn!(remote_name, error = %e, "failed to cache url after upload");
                }
            }
            Err(e) => warn!(remote_name, error = %e, "failed to fetch url after upload"),
        }
    }

    /// Resolves a remote name to a URL, preferring the cache.
    ///
    /// # Errors
    ///
    /// Returns an error if `remote_name` is empty, the cache cannot be read,
    /// or the provider fails on a cache miss.
    pub async fn get_image_url(&self, remote_name: &str) -> SyncResult<String> {
        require_id("remoteName", remote_name)?;
        if let Some(url) = self.cache.get(remote_name)? {
            self.stats.write().url_cache_hits += 1;
            return Ok(url);
        }

        self.stats.write().url_cache_misses += 1;
        let remote = self.provider.get_remote_url(remote_name).await?;
        if let Err(e) = self.cache.put(remote_name, &remote.url) {
            warn!(remote_name, error = %e, "failed to cache fetched url");
        }
        Ok(remote.url)
    }

    /// Returns true if a synced record carries `remote_name`.
    ///
    /// Never fails: lookup errors are logged and read as `false`.
    pub fn is_image_synced(&self, remote_name: &str) -> bool {
        match self.records.get_by_remote_name(remote_name) {
            Ok(record) => record.is_some_and(|r| r.is_synced),
            Err(e) => {
                warn!(remote_name, error = %e, "sync lookup failed");
                false
            }
        }
    }

    /// Summarizes every record.
    ///
    /// Never fails: if the records cannot be read the counts are zero.
    pub fn get_sync_status(&self) -> SyncStatus {
        let is_syncing = self.is_batch_running();
        match self.records.get_all() {
            Ok(records) => aggregate_status(&records, is_syncing),
            Err(e) => {
                warn!(error = %e, "failed to read sync records for status");
                SyncStatus {
                    is_syncing,
                    ..SyncStatus::default()
                }
            }
        }
    }

    /// Returns true while a batch operation holds the batch lock.
    pub fn is_batch_running(&self) -> bool {
        self.batch_lock.try_lock().is_err()
    }

    /// Retries failed images whose retry count is below the limit.
    ///
    /// `max_retries` overrides the configured limit for this call.
    ///
    /// # Errors
    ///
    /// Returns an error only if the record set cannot be read. Per-image
    /// failures are reported in the [`BatchReport`].
    pub async fn retry_failed_syncs(&self, max_retries: Option<u32>) -> SyncResult<BatchReport> {
        let _guard = self.batch_lock.lock().await;
        let config = self.config.get();
        let limit = max_retries.unwrap_or(config.max_retries);

        let eligible: Vec<SyncRecord> = self
            .records
            .get_all()?
            .into_iter()
            .filter(|r| r.is_retry_eligible(limit))
            .collect();
        info!(eligible = eligible.len(), limit, "retrying failed syncs");

        Ok(self
            .run_batches("retry", &eligible, config.batch_size, &config)
            .await)
    }

    /// Uploads every image that has not been synced or failed.
    ///
    /// `batch_size` overrides the configured chunk size for this call.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Validation`] for a batch size outside the
    /// configurable range, or an error if the record set cannot be read.
    pub async fn sync_pending_images(&self, batch_size: Option<usize>) -> SyncResult<BatchReport> {
        if let Some(size) = batch_size {
            if !BATCH_SIZE_RANGE.contains(&size) {
                return Err(SyncError::Validation(format!(
                    "batchSize must be between {} and {}, got {size}",
                    BATCH_SIZE_RANGE.start(),
                    BATCH_SIZE_RANGE.end()
                )));
            }
        }

        let _guard = self.batch_lock.lock().await;
        let config = self.config.get();
        let size = batch_size.unwrap_or(config.batch_size);

        let eligible: Vec<SyncRecord> = self
            .records
            .get_all()?
            .into_iter()
            .filter(SyncRecord::is_pending_upload)
            .collect();
        info!(eligible = eligible.len(), batch_size = size, "syncing pending images");

        Ok(self.run_batches("pending", &eligible, size, &config).await)
    }

    async fn run_batches(
        &self,
        kind: &'static str,
        eligible: &[SyncRecord],
        batch_size: usize,
        config: &SyncConfig,
    ) -> BatchReport {
        let mut report = BatchReport {
            eligible: eligible.len(),
            ..BatchReport::default()
        };
        let options = UploadOptions::from_config(config);

        for (index, chunk) in eligible.chunks(batch_size.max(1)).enumerate() {
            if index > 0 {
                let chunk_index = u32::try_from(index).unwrap_or(u32::MAX);
                let pause = self.backoff.delay(config.retry_delay, chunk_index);
                if !pause.is_zero() {
                    debug!(kind, chunk = index, pause = ?pause, "pausing before chunk");
                    tokio::time::sleep(pause).await;
                }
            }

            let results = join_all(
                chunk
                    .iter()
                    .map(|r| self.sync_one(&r.local_ref, &r.owner_id, &options)),
            )
            .await;

            report.chunks += 1;
            for (record, result) in chunk.iter().zip(results) {
                report.attempted += 1;
                match result {
                    Ok(_) => report.succeeded += 1,
                    Err(e) => {
                        report.failed += 1;
                        debug!(kind, local_ref = %record.local_ref, error = %e, "batch item failed");
                    }
                }
            }
        }

        self.stats.write().batches_run += 1;
        info!(
            kind,
            eligible = report.eligible,
            succeeded = report.succeeded,
            failed = report.failed,
            chunks = report.chunks,
            "batch finished"
        );
        report
    }

    /// Deletes every record owned by `owner_id` and returns how many went.
    ///
    /// Cached URLs are left alone.
    ///
    /// # Errors
    ///
    /// Returns an error if `owner_id` is empty or storage fails.
    pub fn clear_sync_records(&self, owner_id: &str) -> SyncResult<usize> {
        let removed = self.records.delete_for_owner(owner_id)?;
        info!(owner_id, removed, "cleared sync records");
        Ok(removed)
    }

    /// Caches a URL for a remote name.
    ///
    /// # Errors
    ///
    /// Returns an error if an argument is empty or storage fails.
    pub fn cache_image_url(&self, remote_name: &str, url: &str) -> SyncResult<()> {
        Ok(self.cache.put(remote_name, url)?)
    }

    /// Returns the cached URL for a remote name, if fresh.
    ///
    /// # Errors
    ///
    /// Returns an error if `remote_name` is empty or storage fails.
    pub fn get_cached_image_url(&self, remote_name: &str) -> SyncResult<Option<String>> {
        Ok(self.cache.get(remote_name)?)
    }

    /// Drops the cached URL for a remote name.
    ///
    /// # Errors
    ///
    /// Returns an error if `remote_name` is empty or storage fails.
    pub fn clear_cached_image_url(&self, remote_name: &str) -> SyncResult<()> {
        Ok(self.cache.clear(remote_name)?)
    }

    /// Drops every cached URL.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub fn clear_url_cache(&self) -> SyncResult<()> {
        Ok(self.cache.clear_all()?)
    }

    /// Evicts expired URLs and returns how many went.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub fn sweep_expired_urls(&self) -> SyncResult<usize> {
        Ok(self.cache.sweep_expired()?)
    }

    /// Size of the persisted URL cache in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub fn url_cache_size_bytes(&self) -> SyncResult<usize> {
        Ok(self.cache.size_bytes()?)
    }

    /// Returns a snapshot of the current tunables.
    pub fn config(&self) -> SyncConfig {
        self.config.get()
    }

    /// Replaces the tunables. Running batches keep the snapshot they took.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Config`] and changes nothing if any field is out
    /// of range.
    pub fn update_config(&self, config: SyncConfig) -> SyncResult<()> {
        self.config.update(config)?;
        Ok(())
    }

    /// Gets the current stats.
    pub fn stats(&self) -> EngineStats {
        self.stats.read().clone()
    }

    /// The record store this orchestrator writes to.
    pub fn records(&self) -> &SyncRecordStore<S> {
        &self.records
    }

    /// The provider this orchestrator uploads through.
    pub fn provider(&self) -> &P {
        &self.provider
    }
}

impl<P, S, C> std::fmt::Debug for SyncOrchestrator<P, S, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncOrchestrator")
            .field("backoff", &self.backoff)
            .field("stats", &*self.stats.read())
            .finish_non_exhaustive()
    }
}
