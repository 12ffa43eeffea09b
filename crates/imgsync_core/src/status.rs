//! Point-in-time sync summary.

use crate::record::{RecordState, SyncRecord};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Aggregate counts over every sync record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    /// Number of records.
    pub total: usize,
    /// Records uploaded.
    pub synced: usize,
    /// Records whose last attempt failed.
    pub failed: usize,
    /// Records never attempted.
    pub pending: usize,
    /// Records with an attempt in flight.
    pub syncing: usize,
    /// `synced / total` as a rounded percentage, 0 when empty.
    pub percentage: u8,
    /// Most recent successful upload.
    pub last_sync_at: Option<DateTime<Utc>>,
    /// Whether a batch operation is running.
    pub is_syncing: bool,
}

/// Summarizes `records`.
///
/// `pending` is whatever is left after the other three buckets, so the four
/// counts always add up to `total`.
#[must_use]
pub fn aggregate_status(records: &[SyncRecord], is_syncing: bool) -> SyncStatus {
    let mut status = SyncStatus {
        total: records.len(),
        is_syncing,
        ..SyncStatus::default()
    };

    for record in records {
        match record.state() {
            RecordState::Synced => {
                status.synced += 1;
                if record.synced_at > status.last_sync_at {
                    status.last_sync_at = record.synced_at;
                }
            }
            RecordState::Failed => status.failed += 1,
            RecordState::Syncing => status.syncing += 1,
            RecordState::Pending => {}
        }
    }

    status.pending = status.total - status.synced - status.failed - status.syncing;
    status.percentage = percentage(status.synced, status.total);
    status
}

fn percentage(part: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    // Integer round-half-up of part * 100 / total; part <= total keeps it <= 100.
    let rounded = (part * 200 + total) / (total * 2);
    u8::try_from(rounded).unwrap_or(100)
}
