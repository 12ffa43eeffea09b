//! # imgsync Core
//!
//! Durable state for the offline-first image sync engine.
//!
//! This crate provides:
//! - [`SyncRecord`] and its lifecycle (pending → syncing → synced | failed)
//! - [`SyncRecordStore`] - one record per local file reference
//! - [`UrlCache`] - remote URLs kept for a configurable TTL
//! - [`SyncConfig`] / [`ConfigManager`] - validated tunables
//! - [`aggregate_status`] - counts over the whole record set
//!
//! Everything here sits on the four-operation [`imgsync_storage::KeyValueStore`]
//! and performs no network I/O.
//!
//! ## Example
//!
//! ```rust
//! use imgsync_core::{SyncRecord, SyncRecordStore};
//! use imgsync_storage::InMemoryStore;
//! use std::sync::Arc;
//!
//! let store = SyncRecordStore::new(Arc::new(InMemoryStore::new()));
//! store.upsert(&SyncRecord::new("local://a.jpg", "recipe-1")).unwrap();
//! assert_eq!(store.get_for_owner("recipe-1").unwrap().len(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod clock;
mod config;
mod error;
mod record;
mod status;
mod store;

pub use cache::{CacheEntry, UrlCache, URL_CACHE_KEY};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    ConfigManager, SharedConfig, SyncConfig, BATCH_SIZE_RANGE, CACHE_TTL_MS_RANGE,
    COMPRESSION_QUALITY_RANGE, MAX_FILE_SIZE_RANGE, MAX_RETRIES_RANGE, RETRY_DELAY_MS_RANGE,
};
pub use error::{require_id, CoreError, CoreResult};
pub use record::{RecordState, SyncRecord, UploadOutcome};
pub use status::{aggregate_status, SyncStatus};
pub use store::{SyncRecordStore, LEGACY_RECORDS_KEY, RECORD_KEY_PREFIX};
