//! Test fixtures and engine helpers.
//!
//! Provides a ready-wired orchestrator over in-memory storage, record
//! builders for each lifecycle state, and a store that fails on demand.

use chrono::{DateTime, TimeZone, Utc};
use imgsync_core::{ConfigManager, ManualClock, SharedConfig, SyncConfig, SyncRecord, UploadOutcome};
use imgsync_storage::{FileStore, InMemoryStore, KeyValueStore, StorageError, StorageResult};
use imgsync_sync_engine::{MockProvider, SyncOrchestrator};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// Fixed starting instant for harness clocks.
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .expect("valid fixture timestamp")
}

/// A store wrapper that can be told to fail reads or writes.
#[derive(Debug, Default)]
pub struct FailingStore<S = InMemoryStore> {
    inner: S,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl<S: KeyValueStore> FailingStore<S> {
    /// Wraps `inner` with both failure switches off.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Makes `get` and `list_keys` fail.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes `set` and `remove` fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// The wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn check(flag: &AtomicBool) -> StorageResult<()> {
        if flag.load(Ordering::SeqCst) {
            Err(StorageError::Io(io::Error::other("injected storage failure")))
        } else {
            Ok(())
        }
    }
}

impl<S: KeyValueStore> KeyValueStore for FailingStore<S> {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Self::check(&self.fail_reads)?;
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        Self::check(&self.fail_writes)?;
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        Self::check(&self.fail_writes)?;
        self.inner.remove(key)
    }

    fn list_keys(&self) -> StorageResult<Vec<String>> {
        Self::check(&self.fail_reads)?;
        self.inner.list_keys()
    }
}

/// The orchestrator type a [`Harness`] drives.
pub type HarnessEngine = SyncOrchestrator<Arc<MockProvider>, FailingStore, ManualClock>;

/// An orchestrator wired to a mock provider, in-memory storage and a
/// manual clock, with handles to each.
pub struct Harness {
    /// The orchestrator under test.
    pub engine: HarnessEngine,
    /// The scripted provider.
    pub provider: Arc<MockProvider>,
    /// The backing store.
    pub store: Arc<FailingStore>,
    /// The clock the engine reads.
    pub clock: ManualClock,
    /// The config manager the engine reads.
    pub config: SharedConfig,
}

impl Harness {
    /// Creates a harness with default tunables.
    pub fn new() -> Self {
        Self::with_config(SyncConfig::default())
    }

    /// Creates a harness with the given tunables.
    pub fn with_config(config: SyncConfig) -> Self {
        Self::with_store(config, FailingStore::default())
    }

    /// Creates a harness over pre-populated storage.
    pub fn with_store(config: SyncConfig, store: FailingStore) -> Self {
        let provider = Arc::new(MockProvider::new());
        let store = Arc::new(store);
        let clock = ManualClock::new(epoch());
        let config = ConfigManager::shared(config).expect("Invalid harness config");
        let engine = SyncOrchestrator::with_clock(
            Arc::clone(&config),
            Arc::clone(&provider),
            Arc::clone(&store),
            clock.clone(),
        )
        .expect("Failed to build harness engine");

        Self {
            engine,
            provider,
            store,
            clock,
            config,
        }
    }

    /// Writes `records` straight into the record store.
    pub fn seed<I>(&self, records: I)
    where
        I: IntoIterator<Item = SyncRecord>,
    {
        for record in records {
            self.engine
                .records()
                .upsert(&record)
                .expect("Failed to seed record");
        }
    }

    /// Reads one record back.
    pub fn record(&self, local_ref: &str) -> Option<SyncRecord> {
        self.engine
            .records()
            .get(local_ref)
            .expect("Failed to read record")
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

/// A directory-backed store that outlives reopen cycles.
pub struct TempStore {
    dir: TempDir,
}

impl TempStore {
    /// Creates an empty temporary directory.
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Opens a fresh [`FileStore`] handle on the directory.
    pub fn open(&self) -> Arc<FileStore> {
        Arc::new(FileStore::open(self.dir.path()).expect("Failed to open file store"))
    }

    /// The directory path.
    pub fn path(&self) -> &std::path::Path {
        self.dir.path()
    }
}

impl Default for TempStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Record builders for each lifecycle state.
pub mod records {
    use super::*;

    /// A record that was never attempted.
    pub fn pending(local_ref: &str, owner_id: &str) -> SyncRecord {
        SyncRecord::new(local_ref, owner_id)
    }

    /// A record whose last of `attempts` uploads failed with `message`.
    pub fn failed(local_ref: &str, owner_id: &str, attempts: u32, message: &str) -> SyncRecord {
        let mut record = SyncRecord::new(local_ref, owner_id);
        record.retry_count = attempts;
        record.last_attempt_at = Some(epoch());
        record.mark_failed(message);
        record
    }

    /// A record uploaded as `remote_name` at `at`.
    pub fn synced(local_ref: &str, owner_id: &str, remote_name: &str, at: DateTime<Utc>) -> SyncRecord {
        let mut record = SyncRecord::new(local_ref, owner_id);
        record.begin_attempt(at);
        record.mark_synced(
            UploadOutcome {
                remote_name: remote_name.to_string(),
                file_size: Some(2048),
                content_type: Some("image/jpeg".into()),
            },
            at,
        );
        record
    }

    /// `count` pending records named `local://<prefix>-<i>.jpg`.
    pub fn pending_batch(prefix: &str, owner_id: &str, count: usize) -> Vec<SyncRecord> {
        (0..count)
            .map(|i| pending(&format!("local://{prefix}-{i}.jpg"), owner_id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use imgsync_core::RecordState;

    #[test]
    fn builders_produce_each_state() {
        assert_eq!(records::pending("a", "r").state(), RecordState::Pending);
        assert_eq!(records::failed("a", "r", 2, "x").state(), RecordState::Failed);
        assert_eq!(records::synced("a", "r", "a_1.jpg", epoch()).state(), RecordState::Synced);
    }

    #[test]
    fn failing_store_switches() {
        let store: FailingStore = FailingStore::default();
        store.set("k", "v").unwrap();

        store.fail_reads(true);
        assert!(store.get("k").is_err());
        assert!(store.list_keys().is_err());
        store.set("k", "w").unwrap();

        store.fail_reads(false);
        store.fail_writes(true);
        assert!(store.remove("k").is_err());
        assert_eq!(store.get("k").unwrap().as_deref(), Some("w"));
    }

    #[test]
    fn harness_seeds_records() {
        let harness = Harness::new();
        harness.seed(records::pending_batch("img", "r1", 3));
        assert_eq!(harness.engine.get_sync_status().pending, 3);
        assert!(harness.record("local://img-0.jpg").is_some());
    }

    #[test]
    fn temp_store_survives_reopen() {
        let temp = TempStore::new();
        temp.open().set("k", "v").unwrap();
        assert_eq!(temp.open().get("k").unwrap().as_deref(), Some("v"));
    }
}
