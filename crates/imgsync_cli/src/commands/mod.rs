//! CLI command implementations.

pub mod cache;
pub mod clear_owner;
pub mod config;
pub mod records;
pub mod status;

use imgsync_core::{ConfigManager, SharedConfig, SyncConfig, SystemClock, UrlCache};
use imgsync_storage::FileStore;
use std::path::Path;
use std::sync::Arc;

/// Result type shared by the commands.
pub type CommandResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Opens an existing store directory.
///
/// Unlike [`FileStore::open`], a missing directory is an error so a mistyped
/// path is not silently created.
pub fn open_store(path: &Path) -> CommandResult<Arc<FileStore>> {
    if !path.is_dir() {
        return Err(format!("No store found at {}", path.display()).into());
    }
    Ok(Arc::new(FileStore::open(path)?))
}

/// Opens the URL cache of a store with the given tunables.
pub fn open_cache(
    store: Arc<FileStore>,
    config: SyncConfig,
) -> CommandResult<UrlCache<FileStore, SystemClock>> {
    let config: SharedConfig = ConfigManager::shared(config)?;
    Ok(UrlCache::new(store, config, SystemClock))
}

/// Formats a byte count for humans.
pub fn format_size(bytes: usize) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
