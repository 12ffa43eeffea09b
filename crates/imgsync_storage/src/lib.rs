//! # imgsync Storage
//!
//! Key-value persistence primitive for imgsync.
//!
//! This crate provides the lowest-level storage abstraction used by the
//! sync record store and the URL cache. Stores are **opaque string maps** -
//! they do not interpret the values they hold.
//!
//! ## Design Principles
//!
//! - Four operations only: `get`, `set`, `remove`, `list_keys`
//! - No knowledge of records, caches or JSON layouts
//! - Must be `Send + Sync` for concurrent access
//! - A single `set` replaces the value for its key atomically
//!
//! ## Available Stores
//!
//! - [`InMemoryStore`] - For testing and ephemeral state
//! - [`FileStore`] - One file per key inside a directory
//!
//! ## Example
//!
//! ```rust
//! use imgsync_storage::{InMemoryStore, KeyValueStore};
//!
//! let store = InMemoryStore::new();
//! store.set("greeting", "hello world").unwrap();
//! assert_eq!(store.get("greeting").unwrap().as_deref(), Some("hello world"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod memory;
mod store;

pub use error::{StorageError, StorageResult};
pub use file::FileStore;
pub use memory::InMemoryStore;
pub use store::{validate_key, KeyValueStore};
