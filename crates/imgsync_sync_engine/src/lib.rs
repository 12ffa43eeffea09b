//! # imgsync Sync Engine
//!
//! Uploads locally captured images to a remote object store and keeps their
//! sync state durable across restarts.
//!
//! This crate provides:
//! - [`SyncOrchestrator`] - per-image state machine (pending → syncing →
//!   synced | failed) and the batch scheduler
//! - [`ImageProvider`] - the seam to the remote store, with [`MockProvider`]
//!   for tests
//! - [`BackoffPolicy`] - pacing between batch chunks
//!
//! ## Batching
//!
//! `retry_failed_syncs` and `sync_pending_images` split their work into
//! chunks of `batchSize`. Uploads inside a chunk run concurrently; chunks run
//! one after another with a pause chosen by the backoff policy. Only one
//! batch runs at a time.
//!
//! ## Key Invariants
//!
//! - A synced image is never uploaded again
//! - Every attempt is persisted before the provider is called
//! - A successful upload clears any earlier error
//! - A failed URL prefetch never fails an upload

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backoff;
mod error;
mod orchestrator;
mod provider;

pub use backoff::{BackoffPolicy, ConstantBackoff, ExponentialBackoff};
pub use error::{SyncError, SyncResult};
pub use orchestrator::{BatchReport, EngineStats, SyncOrchestrator};
pub use provider::{
    ImageProvider, MockProvider, RemoteUrl, UploadCall, UploadOptions, UploadRequest,
};
