//! Records command implementation.

use super::{open_store, CommandResult};
use imgsync_core::{RecordState, SyncRecord, SyncRecordStore};
use std::path::Path;

/// Loads records, optionally for one owner.
pub fn collect(path: &Path, owner: Option<&str>) -> CommandResult<Vec<SyncRecord>> {
    let records = SyncRecordStore::new(open_store(path)?);
    Ok(match owner {
        Some(owner) => records.get_for_owner(owner)?,
        None => records.get_all()?,
    })
}

/// Runs the records command.
pub fn run(path: &Path, owner: Option<&str>, format: &str) -> CommandResult<()> {
    let records = collect(path, owner)?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No sync records");
        return Ok(());
    }
    for record in &records {
        println!("{}", describe(record));
    }
    println!();
    println!("{} record(s)", records.len());
    Ok(())
}

fn describe(record: &SyncRecord) -> String {
    let state = match record.state() {
        RecordState::Pending => "pending",
        RecordState::Syncing => "syncing",
        RecordState::Synced => "synced",
        RecordState::Failed => "failed",
    };
    let mut line = format!(
        "{:<8} {} owner={} attempts={}",
        state, record.local_ref, record.owner_id, record.retry_count
    );
    if let Some(name) = &record.remote_name {
        line.push_str(&format!(" remote={name}"));
    }
    if let Some(message) = record.error_message.as_ref().filter(|_| record.has_error) {
        line.push_str(&format!(" error=\"{message}\""));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use imgsync_storage::FileStore;
    use std::sync::Arc;

    #[test]
    fn filters_by_owner() {
        let dir = tempfile::tempdir().unwrap();
        let store = SyncRecordStore::new(Arc::new(FileStore::open(dir.path()).unwrap()));
        store.upsert(&SyncRecord::new("local://a.jpg", "r1")).unwrap();
        store.upsert(&SyncRecord::new("local://b.jpg", "r2")).unwrap();

        assert_eq!(collect(dir.path(), None).unwrap().len(), 2);
        let owned = collect(dir.path(), Some("r2")).unwrap();
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].local_ref, "local://b.jpg");
    }

    #[test]
    fn describes_failures() {
        let mut record = SyncRecord::new("local://a.jpg", "r1");
        record.retry_count = 2;
        record.mark_failed("Network error");
        assert_eq!(
            describe(&record),
            "failed   local://a.jpg owner=r1 attempts=2 error=\"Network error\""
        );
    }
}
