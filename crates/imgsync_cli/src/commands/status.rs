//! Status command implementation.

use super::{format_size, open_cache, open_store, CommandResult};
use imgsync_core::{aggregate_status, SyncConfig, SyncRecordStore, SyncStatus};
use serde::Serialize;
use std::path::Path;

/// Store status report.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    /// Store path.
    pub path: String,
    /// Record counts, including legacy entries not yet migrated.
    pub records: SyncStatus,
    /// Legacy array entries with no per-record copy yet.
    pub legacy_records: usize,
    /// URL cache entries, expired or not.
    pub cache_entries: usize,
    /// URL cache size in bytes.
    pub cache_bytes: usize,
}

/// Builds the report without changing the store.
pub fn collect(path: &Path) -> CommandResult<StatusReport> {
    let store = open_store(path)?;
    let record_store = SyncRecordStore::new(store.clone());
    let mut records = record_store.get_all()?;

    let mut legacy_records = 0;
    for record in record_store.legacy_records()? {
        if !records.iter().any(|r| r.local_ref == record.local_ref) {
            records.push(record);
            legacy_records += 1;
        }
    }
    let cache = open_cache(store, SyncConfig::default())?;

    Ok(StatusReport {
        path: path.display().to_string(),
        records: aggregate_status(&records, false),
        legacy_records,
        cache_entries: cache.len()?,
        cache_bytes: cache.size_bytes()?,
    })
}

/// Runs the status command.
pub fn run(path: &Path, format: &str) -> CommandResult<()> {
    let report = collect(path)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => print_text_output(&report),
    }
    Ok(())
}

fn print_text_output(report: &StatusReport) {
    let status = &report.records;
    println!("imgsync Store Status");
    println!("====================");
    println!();
    println!("Path: {}", report.path);
    println!();
    println!("Records:");
    println!("  Total:    {}", status.total);
    println!("  Synced:   {} ({}%)", status.synced, status.percentage);
    println!("  Failed:   {}", status.failed);
    println!("  Syncing:  {}", status.syncing);
    println!("  Pending:  {}", status.pending);
    match status.last_sync_at {
        Some(at) => println!("  Last sync: {}", at.to_rfc3339()),
        None => println!("  Last sync: never"),
    }
    if report.legacy_records > 0 {
        println!(
            "  Legacy:   {} of these await migration on next engine start",
            report.legacy_records
        );
    }
    println!();
    println!("URL cache:");
    println!("  Entries: {}", report.cache_entries);
    println!("  Size:    {}", format_size(report.cache_bytes));
}
