//! URL cache commands.

use super::{format_size, open_cache, open_store, CommandResult};
use imgsync_core::SyncConfig;
use std::fs;
use std::path::Path;
use tracing::info;

/// Prints the number of entries and the cache size.
pub fn size(path: &Path) -> CommandResult<()> {
    let cache = open_cache(open_store(path)?, SyncConfig::default())?;
    println!("Entries: {}", cache.len()?);
    println!("Size:    {}", format_size(cache.size_bytes()?));
    Ok(())
}

/// Evicts expired entries and returns how many went.
///
/// The TTL comes from `config_file` if given, else the default.
pub fn sweep_expired(path: &Path, config_file: Option<&Path>) -> CommandResult<usize> {
    let config = match config_file {
        Some(file) => SyncConfig::from_json_str(&fs::read_to_string(file)?)?,
        None => SyncConfig::default(),
    };
    let cache = open_cache(open_store(path)?, config)?;
    Ok(cache.sweep_expired()?)
}

/// Runs the sweep command.
pub fn sweep(path: &Path, config_file: Option<&Path>) -> CommandResult<()> {
    let evicted = sweep_expired(path, config_file)?;
    info!(evicted, "swept url cache");
    println!("Evicted {evicted} expired entr{}", if evicted == 1 { "y" } else { "ies" });
    Ok(())
}

/// Removes every cached URL.
pub fn clear(path: &Path) -> CommandResult<()> {
    let cache = open_cache(open_store(path)?, SyncConfig::default())?;
    cache.clear_all()?;
    info!("cleared url cache");
    println!("URL cache cleared");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use imgsync_core::URL_CACHE_KEY;
    use imgsync_storage::{FileStore, KeyValueStore};

    #[test]
    fn sweep_uses_config_ttl() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store
            .set(
                URL_CACHE_KEY,
                r#"{"old.jpg": {"url": "https://cdn/old", "cachedAt": 0}}"#,
            )
            .unwrap();

        let config = dir.path().join("config.json");
        fs::write(&config, r#"{"cacheTtlMs": 60000}"#).unwrap();
        assert_eq!(sweep_expired(dir.path(), Some(&config)).unwrap(), 1);
        assert!(store.get(URL_CACHE_KEY).unwrap().is_none());
    }

    #[test]
    fn clear_removes_the_blob() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store.set(URL_CACHE_KEY, "{}").unwrap();

        clear(dir.path()).unwrap();
        assert!(store.get(URL_CACHE_KEY).unwrap().is_none());
    }
}
