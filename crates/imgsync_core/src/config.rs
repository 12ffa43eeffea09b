//! Sync configuration.

use crate::error::{CoreError, CoreResult};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;

/// Bounds for `max_retries`.
pub const MAX_RETRIES_RANGE: RangeInclusive<u32> = 0..=10;
/// Bounds for `retry_delay`, in milliseconds.
pub const RETRY_DELAY_MS_RANGE: RangeInclusive<u64> = 100..=60_000;
/// Bounds for `batch_size`.
pub const BATCH_SIZE_RANGE: RangeInclusive<usize> = 1..=50;
/// Bounds for `cache_ttl`, in milliseconds (one minute to seven days).
pub const CACHE_TTL_MS_RANGE: RangeInclusive<u64> = 60_000..=7 * 24 * 60 * 60 * 1000;
/// Bounds for `max_file_size_bytes` (1 KiB to 100 MiB).
pub const MAX_FILE_SIZE_RANGE: RangeInclusive<u64> = 1024..=100 * 1024 * 1024;
/// Bounds for `compression_quality`.
pub const COMPRESSION_QUALITY_RANGE: RangeInclusive<f32> = 0.1..=1.0;

/// Tunables for uploads, retries and the URL cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncConfig {
    /// Attempts after which a failed record is left out of automatic retry.
    pub max_retries: u32,
    /// Base pause between batch chunks.
    #[serde(rename = "retryDelayMs", with = "duration_ms")]
    pub retry_delay: Duration,
    /// Records uploaded concurrently per chunk.
    pub batch_size: usize,
    /// How long a cached remote URL stays valid.
    #[serde(rename = "cacheTtlMs", with = "duration_ms")]
    pub cache_ttl: Duration,
    /// Largest image the provider may upload.
    pub max_file_size_bytes: u64,
    /// MIME types the provider may upload.
    pub allowed_content_types: Vec<String>,
    /// Quality hint handed to the provider's encoder.
    pub compression_quality: f32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_millis(1000),
            batch_size: 5,
            cache_ttl: Duration::from_secs(24 * 60 * 60),
            max_file_size_bytes: 10 * 1024 * 1024, // 10 MiB
            allowed_content_types: vec![
                "image/jpeg".into(),
                "image/png".into(),
                "image/webp".into(),
            ],
            compression_quality: 0.8,
        }
    }
}

impl SyncConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a configuration from JSON. Missing fields take defaults.
    ///
    /// The result is validated.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or a value is out of bounds.
    pub fn from_json_str(json: &str) -> CoreResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Sets the retry limit.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the pause between batch chunks.
    #[must_use]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Sets the chunk size.
    #[must_use]
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Sets the URL cache TTL.
    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Sets the upload size limit.
    #[must_use]
    pub fn with_max_file_size_bytes(mut self, bytes: u64) -> Self {
        self.max_file_size_bytes = bytes;
        self
    }

    /// Sets the allowed content types.
    #[must_use]
    pub fn with_allowed_content_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_content_types = types.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the compression quality hint.
    #[must_use]
    pub fn with_compression_quality(mut self, quality: f32) -> Self {
        self.compression_quality = quality;
        self
    }

    /// Checks every field against its bounds.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] naming the first offending field.
    pub fn validate(&self) -> CoreResult<()> {
        if !MAX_RETRIES_RANGE.contains(&self.max_retries) {
            return Err(out_of_range("maxRetries", &MAX_RETRIES_RANGE));
        }
        let delay_ms = millis(self.retry_delay);
        if !RETRY_DELAY_MS_RANGE.contains(&delay_ms) {
            return Err(out_of_range("retryDelayMs", &RETRY_DELAY_MS_RANGE));
        }
        if !BATCH_SIZE_RANGE.contains(&self.batch_size) {
            return Err(out_of_range("batchSize", &BATCH_SIZE_RANGE));
        }
        let ttl_ms = millis(self.cache_ttl);
        if !CACHE_TTL_MS_RANGE.contains(&ttl_ms) {
            return Err(out_of_range("cacheTtlMs", &CACHE_TTL_MS_RANGE));
        }
        if !MAX_FILE_SIZE_RANGE.contains(&self.max_file_size_bytes) {
            return Err(out_of_range("maxFileSizeBytes", &MAX_FILE_SIZE_RANGE));
        }
        if self.allowed_content_types.is_empty() {
            return Err(CoreError::invalid_config(
                "allowedContentTypes",
                "must list at least one type",
            ));
        }
        if self.allowed_content_types.iter().any(|t| t.trim().is_empty()) {
            return Err(CoreError::invalid_config(
                "allowedContentTypes",
                "must not contain blank entries",
            ));
        }
        // NaN fails `contains`, so it is rejected here too.
        if !COMPRESSION_QUALITY_RANGE.contains(&self.compression_quality) {
            return Err(out_of_range(
                "compressionQuality",
                &COMPRESSION_QUALITY_RANGE,
            ));
        }
        Ok(())
    }

    /// Returns true if `content_type` is on the allow-list (case-insensitive).
    #[must_use]
    pub fn allows_content_type(&self, content_type: &str) -> bool {
        self.allowed_content_types
            .iter()
            .any(|t| t.eq_ignore_ascii_case(content_type))
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

fn out_of_range<T: std::fmt::Display>(field: &'static str, range: &RangeInclusive<T>) -> CoreError {
    CoreError::invalid_config(
        field,
        format!("must be between {} and {}", range.start(), range.end()),
    )
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(super::millis(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

/// A config shared between the orchestrator and the URL cache.
pub type SharedConfig = Arc<ConfigManager>;

/// Holds the live [`SyncConfig`].
///
/// Updates replace the whole value and are validated first; a rejected
/// update leaves the current config untouched. Readers get a snapshot, so a
/// batch that read the config keeps using that copy even if it is replaced
/// midway.
#[derive(Debug)]
pub struct ConfigManager {
    current: RwLock<SyncConfig>,
}

impl ConfigManager {
    /// Creates a manager holding a validated `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` is out of bounds.
    pub fn new(config: SyncConfig) -> CoreResult<Self> {
        config.validate()?;
        Ok(Self {
            current: RwLock::new(config),
        })
    }

    /// Creates a shared manager.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` is out of bounds.
    pub fn shared(config: SyncConfig) -> CoreResult<SharedConfig> {
        Ok(Arc::new(Self::new(config)?))
    }

    /// Returns a snapshot of the current config.
    #[must_use]
    pub fn get(&self) -> SyncConfig {
        self.current.read().clone()
    }

    /// Replaces the config after validating it.
    ///
    /// # Errors
    ///
    /// Returns an error, and keeps the old config, if `config` is invalid.
    pub fn update(&self, config: SyncConfig) -> CoreResult<()> {
        config.validate()?;
        *self.current.write() = config;
        Ok(())
    }

    /// Edits a copy of the config and commits it if it validates.
    ///
    /// # Errors
    ///
    /// Returns an error, and keeps the old config, if the edited copy is
    /// invalid.
    pub fn modify<F>(&self, edit: F) -> CoreResult<()>
    where
        F: FnOnce(&mut SyncConfig),
    {
        let mut current = self.current.write();
        let mut next = current.clone();
        edit(&mut next);
        next.validate()?;
        *current = next;
        Ok(())
    }

    /// Restores the defaults.
    pub fn reset(&self) {
        *self.current.write() = SyncConfig::default();
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self {
            current: RwLock::new(SyncConfig::default()),
        }
    }
}
