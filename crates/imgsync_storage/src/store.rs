//! Key-value store trait definition.

use crate::error::{StorageError, StorageResult};
use std::sync::Arc;

/// A string key-value persistence primitive.
///
/// Stores are **opaque**. Callers own the meaning of keys and the format
/// of values; a store only keeps them.
///
/// # Invariants
///
/// - `get` returns exactly the value last passed to `set` for that key
/// - `set` replaces any previous value atomically
/// - `remove` of a missing key is not an error
/// - Empty keys are rejected with [`StorageError::InvalidKey`]
/// - Stores must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`super::InMemoryStore`] - For testing
/// - [`super::FileStore`] - For persistent storage
pub trait KeyValueStore: Send + Sync {
    /// Returns the value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or an I/O error occurs.
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or an I/O error occurs.
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Removes the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or an I/O error occurs.
    fn remove(&self, key: &str) -> StorageResult<()>;

    /// Lists every key currently held by the store, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns an error if the keys cannot be enumerated.
    fn list_keys(&self) -> StorageResult<Vec<String>>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        (**self).remove(key)
    }

    fn list_keys(&self) -> StorageResult<Vec<String>> {
        (**self).list_keys()
    }
}

/// Rejects keys that no store accepts.
///
/// # Errors
///
/// Returns [`StorageError::InvalidKey`] for an empty key.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("key must not be empty".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryStore;

    #[test]
    fn empty_key_is_invalid() {
        assert!(matches!(validate_key(""), Err(StorageError::InvalidKey(_))));
        assert!(validate_key("a").is_ok());
    }

    #[test]
    fn arc_store_delegates() {
        let store: Arc<dyn KeyValueStore> = Arc::new(InMemoryStore::new());
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
        assert_eq!(store.list_keys().unwrap(), vec!["k".to_string()]);
        store.remove("k").unwrap();
        assert!(store.get("k").unwrap().is_none());
    }
}
