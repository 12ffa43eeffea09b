//! Per-image sync records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a record sits in the upload lifecycle.
///
/// This is derived from the persisted flags, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RecordState {
    /// Created, never attempted.
    Pending,
    /// An attempt was recorded and has not finished.
    Syncing,
    /// Uploaded; `remote_name` is set.
    Synced,
    /// The last attempt failed.
    Failed,
}

/// Provider-reported details of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    /// Name assigned by the remote store.
    pub remote_name: String,
    /// Uploaded size in bytes.
    pub file_size: Option<u64>,
    /// Uploaded MIME type.
    pub content_type: Option<String>,
}

/// Durable sync state for one locally captured image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRecord {
    /// Stable local file reference. Unique.
    pub local_ref: String,
    /// Name assigned by the provider on first successful upload.
    #[serde(default)]
    pub remote_name: Option<String>,
    /// Id of the owning recipe.
    pub owner_id: String,
    /// Whether the image has been uploaded.
    #[serde(default)]
    pub is_synced: bool,
    /// Whether the last attempt failed.
    #[serde(default)]
    pub has_error: bool,
    /// Provider message from the last failure.
    #[serde(default)]
    pub error_message: Option<String>,
    /// Number of attempts made.
    #[serde(default)]
    pub retry_count: u32,
    /// Uploaded size in bytes.
    #[serde(default)]
    pub file_size: Option<u64>,
    /// Uploaded MIME type.
    #[serde(default)]
    pub content_type: Option<String>,
    /// When the upload succeeded.
    #[serde(default)]
    pub synced_at: Option<DateTime<Utc>>,
    /// When the last attempt started.
    #[serde(default)]
    pub last_attempt_at: Option<DateTime<Utc>>,
}

impl SyncRecord {
    /// Creates a pending record.
    pub fn new(local_ref: impl Into<String>, owner_id: impl Into<String>) -> Self {
        Self {
            local_ref: local_ref.into(),
            remote_name: None,
            owner_id: owner_id.into(),
            is_synced: false,
            has_error: false,
            error_message: None,
            retry_count: 0,
            file_size: None,
            content_type: None,
            synced_at: None,
            last_attempt_at: None,
        }
    }

    /// Returns the lifecycle state implied by the flags.
    #[must_use]
    pub fn state(&self) -> RecordState {
        if self.is_synced {
            RecordState::Synced
        } else if self.has_error {
            RecordState::Failed
        } else if self.retry_count > 0 {
            RecordState::Syncing
        } else {
            RecordState::Pending
        }
    }

    /// Records the start of an attempt: Pending/Failed → Syncing.
    ///
    /// The error flag is cleared so a crash mid-upload leaves the record
    /// looking in-flight rather than failed with a stale message.
    pub fn begin_attempt(&mut self, now: DateTime<Utc>) {
        self.retry_count = self.retry_count.saturating_add(1);
        self.last_attempt_at = Some(now);
        self.has_error = false;
        self.error_message = None;
    }

    /// Syncing → Synced. Always clears the error flag.
    pub fn mark_synced(&mut self, outcome: UploadOutcome, now: DateTime<Utc>) {
        self.is_synced = true;
        self.has_error = false;
        self.error_message = None;
        self.remote_name = Some(outcome.remote_name);
        self.file_size = outcome.file_size;
        self.content_type = outcome.content_type;
        self.synced_at = Some(now);
    }

    /// Syncing → Failed.
    ///
    /// `remote_name` is kept: once a record has been synced its name
    /// survives later attempts.
    pub fn mark_failed(&mut self, message: impl Into<String>) {
        self.is_synced = false;
        self.has_error = true;
        self.error_message = Some(message.into());
    }

    /// Returns true if automatic retry may pick this record up.
    #[must_use]
    pub fn is_retry_eligible(&self, max_retries: u32) -> bool {
        self.has_error && !self.is_synced && self.retry_count < max_retries
    }

    /// Returns true if this record has never been attempted to completion.
    #[must_use]
    pub fn is_pending_upload(&self) -> bool {
        !self.is_synced && !self.has_error
    }
}
