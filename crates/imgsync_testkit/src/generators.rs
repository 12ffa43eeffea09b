//! Property-based test generators using proptest.
//!
//! Strategies here only produce records that satisfy the record invariants:
//! a synced record has a remote name and no error.

use chrono::{DateTime, TimeZone, Utc};
use imgsync_core::{RecordState, SyncConfig, SyncRecord, UploadOutcome};
use proptest::prelude::*;
use std::time::Duration;

/// Strategy for local file references: short `local://` names and long
/// device `file:///` URIs with `%`-escaped directory names.
pub fn local_ref_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        prop::string::string_regex("local://[a-z0-9]{1,12}\\.(jpg|png|webp)")
            .expect("Invalid regex"),
        file_uri_ref_strategy(),
    ]
}

/// Strategy for device file URIs, typically well over 100 bytes.
pub fn file_uri_ref_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex(
        "file:///data/user/0/com\\.example\\.[a-z]{3,10}/cache/ImagePicker/\
         ([A-Za-z0-9]|%[0-9A-F]{2}){8,40}/\
         [0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}\\.(jpg|png|heic)",
    )
    .expect("Invalid regex")
}

/// Strategy for owner ids.
pub fn owner_id_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("recipe-[0-9]{1,4}").expect("Invalid regex")
}

/// Strategy for timestamps between 2020 and 2030, at millisecond precision.
pub fn timestamp_strategy() -> impl Strategy<Value = DateTime<Utc>> {
    (1_577_836_800_000i64..1_893_456_000_000i64).prop_map(|ms| {
        Utc.timestamp_millis_opt(ms)
            .single()
            .expect("timestamp in range")
    })
}

/// Strategy for lifecycle states.
pub fn record_state_strategy() -> impl Strategy<Value = RecordState> {
    prop_oneof![
        Just(RecordState::Pending),
        Just(RecordState::Syncing),
        Just(RecordState::Failed),
        Just(RecordState::Synced),
    ]
}

/// Strategy for a record in the given state.
pub fn record_in_state(state: RecordState) -> impl Strategy<Value = SyncRecord> {
    (
        local_ref_strategy(),
        owner_id_strategy(),
        1u32..6,
        timestamp_strategy(),
        any::<u16>(),
    )
        .prop_map(move |(local_ref, owner_id, attempts, at, size)| {
            let mut record = SyncRecord::new(local_ref, owner_id);
            match state {
                RecordState::Pending => {}
                RecordState::Syncing => {
                    record.retry_count = attempts - 1;
                    record.begin_attempt(at);
                }
                RecordState::Failed => {
                    record.retry_count = attempts - 1;
                    record.begin_attempt(at);
                    record.mark_failed("Network error");
                }
                RecordState::Synced => {
                    record.retry_count = attempts - 1;
                    record.begin_attempt(at);
                    let remote_name = format!("{size}_{attempts}.jpg");
                    record.mark_synced(
                        UploadOutcome {
                            remote_name,
                            file_size: Some(u64::from(size)),
                            content_type: Some("image/jpeg".into()),
                        },
                        at,
                    );
                }
            }
            record
        })
}

/// Strategy for a record in any state.
pub fn record_strategy() -> impl Strategy<Value = SyncRecord> {
    record_state_strategy().prop_flat_map(record_in_state)
}

/// Strategy for a set of records with distinct local refs.
pub fn record_set_strategy(max: usize) -> impl Strategy<Value = Vec<SyncRecord>> {
    prop::collection::vec(record_strategy(), 0..max).prop_map(|records| {
        records
            .into_iter()
            .enumerate()
            .map(|(i, mut r)| {
                r.local_ref = format!("{}#{i}", r.local_ref);
                r
            })
            .collect()
    })
}

/// Strategy for configs that pass validation.
pub fn valid_config_strategy() -> impl Strategy<Value = SyncConfig> {
    (
        0u32..=10,
        100u64..=60_000,
        1usize..=50,
        60_000u64..=7 * 24 * 60 * 60 * 1000,
        1024u64..=100 * 1024 * 1024,
        1u8..=10,
    )
        .prop_map(|(retries, delay_ms, batch, ttl_ms, max_size, quality)| {
            SyncConfig::new()
                .with_max_retries(retries)
                .with_retry_delay(Duration::from_millis(delay_ms))
                .with_batch_size(batch)
                .with_cache_ttl(Duration::from_millis(ttl_ms))
                .with_max_file_size_bytes(max_size)
                .with_compression_quality(f32::from(quality) / 10.0)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn generated_records_match_their_state(
            (state, record) in record_state_strategy()
                .prop_flat_map(|s| (Just(s), record_in_state(s)))
        ) {
            prop_assert_eq!(record.state(), state);
            if record.is_synced {
                prop_assert!(record.remote_name.is_some());
                prop_assert!(!record.has_error);
            }
        }

        #[test]
        fn record_json_round_trips(record in record_strategy()) {
            let json = serde_json::to_string(&record).unwrap();
            let back: SyncRecord = serde_json::from_str(&json).unwrap();
            prop_assert_eq!(back, record);
        }

        #[test]
        fn file_uri_refs_are_long(local_ref in file_uri_ref_strategy()) {
            prop_assert!(local_ref.starts_with("file:///"));
            prop_assert!(local_ref.len() > 100);
        }

        #[test]
        fn generated_configs_validate(config in valid_config_strategy()) {
            prop_assert!(config.validate().is_ok());
        }
    }
}
