//! Durable sync record store.
//!
//! Each record lives under its own key, `image_sync/record/<localRef>`, so an
//! upsert is a single atomic `set` and two uploads finishing at the same time
//! never overwrite each other's records.
//!
//! Older data may still sit in one JSON array under `image_sync_records`;
//! [`SyncRecordStore::open`] imports it into the per-record layout.

use crate::error::{require_id, CoreError, CoreResult};
use crate::record::SyncRecord;
use imgsync_storage::{KeyValueStore, StorageError};
use std::sync::Arc;

/// Key prefix for per-record entries.
pub const RECORD_KEY_PREFIX: &str = "image_sync/record/";

/// Key of the legacy whole-collection array.
pub const LEGACY_RECORDS_KEY: &str = "image_sync_records";

/// Stores one [`SyncRecord`] per local file reference.
///
/// Lookups by remote name and by owner scan every record. Per-user image
/// counts are small enough for that, but it is O(n) per call.
#[derive(Debug)]
pub struct SyncRecordStore<S> {
    kv: Arc<S>,
}

impl<S> Clone for SyncRecordStore<S> {
    fn clone(&self) -> Self {
        Self {
            kv: Arc::clone(&self.kv),
        }
    }
}

impl<S: KeyValueStore> SyncRecordStore<S> {
    /// Wraps a key-value store without touching legacy data.
    pub fn new(kv: Arc<S>) -> Self {
        Self { kv }
    }

    /// Wraps a key-value store and imports any legacy record array.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage primitive fails.
    pub fn open(kv: Arc<S>) -> CoreResult<Self> {
        let store = Self::new(kv);
        store.migrate_legacy()?;
        Ok(store)
    }

    fn key(local_ref: &str) -> String {
        format!("{RECORD_KEY_PREFIX}{local_ref}")
    }

    /// Imports records from the legacy array key and removes it.
    ///
    /// Entries that fail to parse are skipped. A record already present in
    /// the per-record layout wins over its legacy copy. An entry the store
    /// refuses to write (invalid key or argument) is skipped too, and the
    /// legacy key is then left in place so a later open can retry it.
    /// Returns the number of records imported.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage primitive fails.
    pub fn migrate_legacy(&self) -> CoreResult<usize> {
        let Some(blob) = self.kv.get(LEGACY_RECORDS_KEY)? else {
            return Ok(0);
        };
        let Some(legacy) = parse_legacy(&blob) else {
            return Ok(0);
        };

        let mut imported = 0;
        let mut unwritable = 0;
        for record in legacy {
            match self.import_missing(&record) {
                Ok(true) => imported += 1,
                Ok(false) => {}
                Err(
                    CoreError::InvalidArgument(reason)
                    | CoreError::Storage(StorageError::InvalidKey(reason)),
                ) => {
                    tracing::warn!(
                        local_ref = %record.local_ref,
                        %reason,
                        "skipping legacy sync record the store rejected"
                    );
                    unwritable += 1;
                }
                Err(e) => return Err(e),
            }
        }

        if unwritable == 0 {
            self.kv.remove(LEGACY_RECORDS_KEY)?;
        } else {
            tracing::warn!(unwritable, "keeping legacy record array for a later retry");
        }
        tracing::info!(imported, "migrated legacy sync records");
        Ok(imported)
    }

    /// Reads the legacy record array without migrating it.
    ///
    /// Returns an empty list if there is no legacy array or it is
    /// unreadable. Corrupt entries are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage primitive fails.
    pub fn legacy_records(&self) -> CoreResult<Vec<SyncRecord>> {
        Ok(self
            .kv
            .get(LEGACY_RECORDS_KEY)?
            .and_then(|blob| parse_legacy(&blob))
            .unwrap_or_default())
    }

    /// Writes `record` unless its key already holds a value.
    fn import_missing(&self, record: &SyncRecord) -> CoreResult<bool> {
        if self.kv.get(&Self::key(&record.local_ref))?.is_some() {
            return Ok(false);
        }
        self.upsert(record)?;
        Ok(true)
    }

    fn decode(key: &str, raw: &str) -> Option<SyncRecord> {
        match serde_json::from_str::<SyncRecord>(raw) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(key, error = %e, "skipping corrupt sync record");
                None
            }
        }
    }

    /// Returns the record for `local_ref`.
    ///
    /// A stored value that fails to parse reads as absent.
    ///
    /// # Errors
    ///
    /// Returns an error if `local_ref` is empty or storage fails.
    pub fn get(&self, local_ref: &str) -> CoreResult<Option<SyncRecord>> {
        require_id("localRef", local_ref)?;
        let key = Self::key(local_ref);
        Ok(self
            .kv
            .get(&key)?
            .and_then(|raw| Self::decode(&key, &raw)))
    }

    /// Returns the record whose upload produced `remote_name`. O(n).
    ///
    /// # Errors
    ///
    /// Returns an error if `remote_name` is empty or storage fails.
    pub fn get_by_remote_name(&self, remote_name: &str) -> CoreResult<Option<SyncRecord>> {
        require_id("remoteName", remote_name)?;
        Ok(self
            .get_all()?
            .into_iter()
            .find(|r| r.remote_name.as_deref() == Some(remote_name)))
    }

    /// Inserts or replaces a record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record's `local_ref` is empty or storage fails.
    pub fn upsert(&self, record: &SyncRecord) -> CoreResult<()> {
        require_id("localRef", &record.local_ref)?;
        let json = serde_json::to_string(record)?;
        self.kv.set(&Self::key(&record.local_ref), &json)?;
        Ok(())
    }

    /// Returns every readable record, ordered by `local_ref`.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub fn get_all(&self) -> CoreResult<Vec<SyncRecord>> {
        let mut records = Vec::new();
        for key in self.kv.list_keys()? {
            if !key.starts_with(RECORD_KEY_PREFIX) {
                continue;
            }
            // A key may vanish between listing and reading.
            if let Some(raw) = self.kv.get(&key)? {
                records.extend(Self::decode(&key, &raw));
            }
        }
        records.sort_by(|a, b| a.local_ref.cmp(&b.local_ref));
        Ok(records)
    }

    /// Returns the records owned by `owner_id`. O(n).
    ///
    /// # Errors
    ///
    /// Returns an error if `owner_id` is empty or storage fails.
    pub fn get_for_owner(&self, owner_id: &str) -> CoreResult<Vec<SyncRecord>> {
        require_id("ownerId", owner_id)?;
        Ok(self
            .get_all()?
            .into_iter()
            .filter(|r| r.owner_id == owner_id)
            .collect())
    }

    /// Deletes the record for `local_ref`, if present.
    ///
    /// # Errors
    ///
    /// Returns an error if `local_ref` is empty or storage fails.
    pub fn delete(&self, local_ref: &str) -> CoreResult<()> {
        require_id("localRef", local_ref)?;
        self.kv.remove(&Self::key(local_ref))?;
        Ok(())
    }

    /// Deletes every record owned by `owner_id` and returns how many went.
    ///
    /// # Errors
    ///
    /// Returns an error if `owner_id` is empty or storage fails.
    pub fn delete_for_owner(&self, owner_id: &str) -> CoreResult<usize> {
        let owned = self.get_for_owner(owner_id)?;
        for record in &owned {
            self.kv.remove(&Self::key(&record.local_ref))?;
        }
        Ok(owned.len())
    }
}

/// Parses a legacy array, skipping entries that are corrupt or have no
/// `localRef`. `None` if the array itself is unreadable.
fn parse_legacy(blob: &str) -> Option<Vec<SyncRecord>> {
    let entries: Vec<serde_json::Value> = match serde_json::from_str(blob) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(error = %e, "legacy record array is unreadable, leaving it in place");
            return None;
        }
    };

    let records = entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<SyncRecord>(entry) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(error = %e, "skipping corrupt legacy sync record");
                None
            }
        })
        .filter(|record| !record.local_ref.trim().is_empty())
        .collect();
    Some(records)
}
