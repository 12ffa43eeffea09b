//! Time-bounded cache of remote image URLs.

use crate::clock::{Clock, SystemClock};
use crate::config::SharedConfig;
use crate::error::{require_id, CoreResult};
use imgsync_storage::KeyValueStore;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Key holding the whole cache as one JSON object.
pub const URL_CACHE_KEY: &str = "image_sync/url_cache";

/// A cached URL and when it was stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    /// Fetchable URL.
    pub url: String,
    /// Milliseconds since the UNIX epoch.
    pub cached_at: i64,
}

type Entries = BTreeMap<String, CacheEntry>;

/// Maps remote file names to fetchable URLs for a limited time.
///
/// The TTL is read from the shared config on every call. Expiry is lazy: a
/// read evicts only the entry it touches, and [`UrlCache::sweep_expired`]
/// removes the rest when asked.
#[derive(Debug)]
pub struct UrlCache<S, C = SystemClock> {
    kv: Arc<S>,
    config: SharedConfig,
    clock: C,
    write_lock: Mutex<()>,
}

impl<S: KeyValueStore, C: Clock> UrlCache<S, C> {
    /// Creates a cache over `kv`.
    pub fn new(kv: Arc<S>, config: SharedConfig, clock: C) -> Self {
        Self {
            kv,
            config,
            clock,
            write_lock: Mutex::new(()),
        }
    }

    fn load(&self) -> CoreResult<Entries> {
        let Some(blob) = self.kv.get(URL_CACHE_KEY)? else {
            return Ok(Entries::new());
        };
        let raw: BTreeMap<String, serde_json::Value> = match serde_json::from_str(&blob) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "url cache is unreadable, starting empty");
                return Ok(Entries::new());
            }
        };
        Ok(raw
            .into_iter()
            .filter_map(|(name, value)| match serde_json::from_value(value) {
                Ok(entry) => Some((name, entry)),
                Err(e) => {
                    tracing::warn!(remote_name = %name, error = %e, "skipping corrupt cache entry");
                    None
                }
            })
            .collect())
    }

    fn save(&self, entries: &Entries) -> CoreResult<()> {
        if entries.is_empty() {
            self.kv.remove(URL_CACHE_KEY)?;
        } else {
            self.kv.set(URL_CACHE_KEY, &serde_json::to_string(entries)?)?;
        }
        Ok(())
    }

    fn is_expired(&self, entry: &CacheEntry, now_ms: i64) -> bool {
        let ttl_ms = i64::try_from(self.config.get().cache_ttl.as_millis()).unwrap_or(i64::MAX);
        now_ms.saturating_sub(entry.cached_at) > ttl_ms
    }

    /// Returns the cached URL, evicting it if it has outlived the TTL.
    ///
    /// # Errors
    ///
    /// Returns an error if `remote_name` is empty or storage fails.
    pub fn get(&self, remote_name: &str) -> CoreResult<Option<String>> {
        require_id("remoteName", remote_name)?;
        let _guard = self.write_lock.lock();

        let mut entries = self.load()?;
        let Some(entry) = entries.get(remote_name) else {
            return Ok(None);
        };
        if !self.is_expired(entry, self.clock.now_millis()) {
            return Ok(Some(entry.url.clone()));
        }

        tracing::debug!(remote_name, "evicting expired url");
        entries.remove(remote_name);
        self.save(&entries)?;
        Ok(None)
    }

    /// Caches `url` for `remote_name`, replacing any entry and its age.
    ///
    /// # Errors
    ///
    /// Returns an error if an argument is empty or storage fails.
    pub fn put(&self, remote_name: &str, url: &str) -> CoreResult<()> {
        require_id("remoteName", remote_name)?;
        require_id("url", url)?;
        let _guard = self.write_lock.lock();

        let mut entries = self.load()?;
        entries.insert(
            remote_name.to_string(),
            CacheEntry {
                url: url.to_string(),
                cached_at: self.clock.now_millis(),
            },
        );
        self.save(&entries)
    }

    /// Removes one entry.
    ///
    /// # Errors
    ///
    /// Returns an error if `remote_name` is empty or storage fails.
    pub fn clear(&self, remote_name: &str) -> CoreResult<()> {
        require_id("remoteName", remote_name)?;
        let _guard = self.write_lock.lock();

        let mut entries = self.load()?;
        if entries.remove(remote_name).is_some() {
            self.save(&entries)?;
        }
        Ok(())
    }

    /// Removes every entry.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub fn clear_all(&self) -> CoreResult<()> {
        let _guard = self.write_lock.lock();
        self.kv.remove(URL_CACHE_KEY)?;
        Ok(())
    }

    /// Evicts every expired entry and returns how many went.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub fn sweep_expired(&self) -> CoreResult<usize> {
        let _guard = self.write_lock.lock();

        let mut entries = self.load()?;
        let before = entries.len();
        let now_ms = self.clock.now_millis();
        entries.retain(|_, entry| !self.is_expired(entry, now_ms));

        let evicted = before - entries.len();
        if evicted > 0 {
            self.save(&entries)?;
            tracing::debug!(evicted, "swept expired urls");
        }
        Ok(evicted)
    }

    /// Size of the persisted cache in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub fn size_bytes(&self) -> CoreResult<usize> {
        Ok(self.kv.get(URL_CACHE_KEY)?.map_or(0, |blob| blob.len()))
    }

    /// Number of entries held, expired or not.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub fn len(&self) -> CoreResult<usize> {
        Ok(self.load()?.len())
    }

    /// Returns true if no entries are held.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub fn is_empty(&self) -> CoreResult<bool> {
        Ok(self.len()? == 0)
    }
}
