//! Clear-owner command implementation.

use super::{open_store, CommandResult};
use imgsync_core::SyncRecordStore;
use std::path::Path;
use tracing::info;

/// Deletes every record of `owner` and returns how many went.
///
/// Legacy record arrays are migrated first so their entries are included.
pub fn clear(path: &Path, owner: &str) -> CommandResult<usize> {
    let records = SyncRecordStore::open(open_store(path)?)?;
    Ok(records.delete_for_owner(owner)?)
}

/// Runs the clear-owner command.
pub fn run(path: &Path, owner: &str) -> CommandResult<()> {
    info!("Clearing sync records of {owner}");
    let removed = clear(path, owner)?;
    println!("Removed {removed} record(s) for {owner}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use imgsync_core::{SyncRecord, LEGACY_RECORDS_KEY};
    use imgsync_storage::{FileStore, KeyValueStore};

    #[test]
    fn clears_per_key_and_legacy_records() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        let legacy = vec![
            SyncRecord::new("local://a.jpg", "r1"),
            SyncRecord::new("local://b.jpg", "r2"),
        ];
        store
            .set(LEGACY_RECORDS_KEY, &serde_json::to_string(&legacy).unwrap())
            .unwrap();
        SyncRecordStore::new(std::sync::Arc::new(FileStore::open(dir.path()).unwrap()))
            .upsert(&SyncRecord::new("local://c.jpg", "r1"))
            .unwrap();

        assert_eq!(clear(dir.path(), "r1").unwrap(), 2);
        assert_eq!(crate::commands::records::collect(dir.path(), None).unwrap().len(), 1);
    }

    #[test]
    fn blank_owner_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(clear(dir.path(), "").is_err());
    }
}
