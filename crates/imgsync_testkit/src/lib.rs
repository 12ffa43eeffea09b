//! # imgsync Testkit
//!
//! Test utilities for imgsync.
//!
//! This crate provides:
//! - A wired-up orchestrator harness over a mock provider and manual clock
//! - Record builders for each lifecycle state
//! - A key-value store that fails on demand
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use imgsync_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn uploads_pending_images() {
//!     let harness = Harness::new();
//!     harness.seed(records::pending_batch("img", "recipe-1", 3));
//!     let report = harness.engine.sync_pending_images(None).await.unwrap();
//!     assert_eq!(report.succeeded, 3);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
