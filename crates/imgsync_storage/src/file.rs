//! Directory-backed key-value store for persistent storage.

use crate::error::{StorageError, StorageResult};
use crate::store::{validate_key, KeyValueStore};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

const VALUE_EXT: &str = "kv";
const TEMP_EXT: &str = "kv.tmp";

/// A directory-backed key-value store.
///
/// Each key is stored in its own file inside the directory. The file name is
/// the hex SHA-256 digest of the key, so keys of any length and character
/// set (`/`, `:`, `%`-escapes, long `file:///` URIs) map to a fixed-length,
/// portable file name.
///
/// # File Format
///
/// ```text
/// <key length in bytes>\n<key><value>
/// ```
///
/// The key is kept in the file so [`KeyValueStore::list_keys`] can return it.
///
/// # Durability
///
/// - `set` writes a temporary file and renames it over the old value, so a
///   reader never observes a half-written value
/// - With `sync_on_write` enabled the temporary file is `fsync`ed before
///   the rename
///
/// # Thread Safety
///
/// Writers are serialized by an internal lock. Reads do not take the lock.
///
/// # Example
///
/// ```no_run
/// use imgsync_storage::{FileStore, KeyValueStore};
/// use std::path::Path;
///
/// let store = FileStore::open(Path::new("sync-state")).unwrap();
/// store.set("image_sync/url_cache", "{}").unwrap();
/// ```
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    sync_on_write: bool,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Opens or creates a store rooted at `dir`.
    ///
    /// Missing directories are created. Leftover temporary files from an
    /// interrupted write are removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or read.
    pub fn open(dir: &Path) -> StorageResult<Self> {
        fs::create_dir_all(dir)?;
        let store = Self {
            dir: dir.to_path_buf(),
            sync_on_write: false,
            write_lock: Mutex::new(()),
        };
        store.remove_stale_temp_files()?;
        Ok(store)
    }

    /// Enables or disables `fsync` before each rename.
    #[must_use]
    pub fn with_sync_on_write(mut self, sync_on_write: bool) -> Self {
        self.sync_on_write = sync_on_write;
        self
    }

    /// Returns the store directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.dir
    }

    fn file_stem(key: &str) -> String {
        hex::encode(Sha256::digest(key.as_bytes()))
    }

    fn value_path(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{VALUE_EXT}", Self::file_stem(key)))
    }

    fn temp_path(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{TEMP_EXT}", Self::file_stem(key)))
    }

    fn remove_stale_temp_files(&self) -> StorageResult<()> {
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let is_temp = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(TEMP_EXT));
            if is_temp {
                tracing::debug!(path = %path.display(), "removing interrupted write");
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }

    /// Reads one entry file. `None` if it does not exist.
    fn read_entry(path: &Path) -> StorageResult<Option<(String, String)>> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                return Err(StorageError::Corrupted(format!(
                    "{} is not UTF-8",
                    path.display()
                )))
            }
            Err(e) => return Err(e.into()),
        };
        let (key, value) = split_entry(&raw).ok_or_else(|| {
            StorageError::Corrupted(format!("{} has no key header", path.display()))
        })?;
        Ok(Some((key.to_string(), value.to_string())))
    }
}

fn encode_entry(key: &str, value: &str) -> String {
    format!("{}\n{key}{value}", key.len())
}

fn split_entry(raw: &str) -> Option<(&str, &str)> {
    let (len, rest) = raw.split_once('\n')?;
    let len: usize = len.parse().ok()?;
    if !rest.is_char_boundary(len) {
        return None;
    }
    let (key, value) = rest.split_at(len);
    (!key.is_empty()).then_some((key, value))
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        validate_key(key)?;
        match Self::read_entry(&self.value_path(key))? {
            Some((stored, value)) if stored == key => Ok(Some(value)),
            Some((stored, _)) => Err(StorageError::Corrupted(format!(
                "file for key {key:?} holds key {stored:?}"
            ))),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        validate_key(key)?;
        let _guard = self.write_lock.lock();

        let temp = self.temp_path(key);
        {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp)?;
            file.write_all(encode_entry(key, value).as_bytes())?;
            file.flush()?;
            if self.sync_on_write {
                file.sync_all()?;
            }
        }
        fs::rename(&temp, self.value_path(key))?;

        if self.sync_on_write {
            // Persist the rename itself.
            File::open(&self.dir)?.sync_all()?;
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        validate_key(key)?;
        let _guard = self.write_lock.lock();
        match fs::remove_file(self.value_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn list_keys(&self) -> StorageResult<Vec<String>> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(VALUE_EXT) {
                continue;
            }
            match Self::read_entry(&path) {
                Ok(Some((key, _))) => keys.push(key),
                // Removed between listing and reading.
                Ok(None) => {}
                Err(StorageError::Corrupted(reason)) => {
                    tracing::warn!(%reason, "skipping unreadable key file");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(keys)
    }
}
