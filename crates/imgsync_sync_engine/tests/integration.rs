//! End-to-end tests for the sync orchestrator.

use imgsync_core::{ConfigManager, SyncConfig, SyncRecord, SyncRecordStore, LEGACY_RECORDS_KEY};
use imgsync_storage::KeyValueStore;
use imgsync_sync_engine::{ExponentialBackoff, MockProvider, SyncError, SyncOrchestrator};
use imgsync_testkit::prelude::*;
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

const PICKER_REF: &str = "file:///data/user/0/com.example.recipes/cache/ImagePicker/\
    Camera%20Roll%2FRecipes%202024/3f2a9c1e-5b7d-4e21-9a0c-8d6f1b2e4c7a/\
    b81c47d2-09e5-4f6a-a3d1-6c2e8f4b7a90.jpg";

fn offsets_ms(provider: &MockProvider, start: tokio::time::Instant) -> Vec<u128> {
    provider
        .upload_calls()
        .iter()
        .map(|c| (c.started_at - start).as_millis())
        .collect()
}

#[tokio::test]
async fn first_upload_marks_everything_synced() {
    let harness = Harness::new();

    let name = harness.engine.sync_image("local://a.jpg", "r1").await.unwrap();
    assert_eq!(name, "a_1.jpg");

    let status = harness.engine.get_sync_status();
    assert_eq!(status.total, 1);
    assert_eq!(status.synced, 1);
    assert_eq!(status.failed, 0);
    assert_eq!(status.pending, 0);
    assert_eq!(status.percentage, 100);
    assert_eq!(status.last_sync_at, Some(epoch()));
    assert!(harness.engine.is_image_synced("a_1.jpg"));
}

#[tokio::test]
async fn repeated_sync_makes_no_provider_call() {
    let harness = Harness::new();
    harness.engine.sync_image("local://a.jpg", "r1").await.unwrap();
    let calls = harness.provider.upload_count();

    for _ in 0..3 {
        let name = harness.engine.sync_image("local://a.jpg", "r1").await.unwrap();
        assert_eq!(name, "a_1.jpg");
    }
    assert_eq!(harness.provider.upload_count(), calls);
}

#[tokio::test]
async fn network_failure_is_recorded() {
    let harness = Harness::new();
    harness.provider.fail_uploads_with("Network error");

    let err = harness
        .engine
        .sync_image("local://a.jpg", "r1")
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Network error");
    assert!(err.is_retryable());

    let record = harness.record("local://a.jpg").unwrap();
    assert!(record.has_error);
    assert_eq!(record.retry_count, 1);
    assert_eq!(record.error_message.as_deref(), Some("Network error"));
    assert_eq!(harness.engine.get_sync_status().failed, 1);
}

#[tokio::test(start_paused = true)]
async fn pending_images_are_uploaded_in_paced_groups() {
    let harness = Harness::with_config(
        SyncConfig::new().with_retry_delay(Duration::from_millis(1000)),
    );
    harness.seed(records::pending_batch("img", "r1", 10));
    harness.provider.set_latency(Duration::from_millis(200));

    let start = tokio::time::Instant::now();
    let report = harness.engine.sync_pending_images(Some(3)).await.unwrap();

    assert_eq!(report.eligible, 10);
    assert_eq!(report.attempted, 10);
    assert_eq!(report.succeeded, 10);
    assert_eq!(report.chunks, 4);
    assert!(harness.provider.peak_concurrency() <= 3);

    // Each group starts after the previous one finished (200ms) plus the pause.
    assert_eq!(
        offsets_ms(&harness.provider, start),
        vec![0, 0, 0, 1200, 1200, 1200, 2400, 2400, 2400, 3600]
    );
    assert_eq!(harness.engine.get_sync_status().synced, 10);
}

#[tokio::test]
async fn cached_url_expires_after_ttl() {
    let ttl = Duration::from_secs(60);
    let harness = Harness::with_config(SyncConfig::new().with_cache_ttl(ttl));
    harness
        .engine
        .cache_image_url("x.jpg", "https://cdn.example.com/x.jpg")
        .unwrap();

    harness.clock.advance(ttl);
    assert!(harness.engine.get_cached_image_url("x.jpg").unwrap().is_some());

    harness.clock.advance(Duration::from_millis(1));
    assert!(harness.engine.get_cached_image_url("x.jpg").unwrap().is_none());
    assert_eq!(harness.engine.url_cache_size_bytes().unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn retry_never_exceeds_the_limit() {
    let harness = Harness::with_config(SyncConfig::new().with_max_retries(3));
    harness.seed([
        records::failed("local://a.jpg", "r1", 1, "Network error"),
        records::failed("local://b.jpg", "r1", 3, "Network error"),
        records::failed("local://c.jpg", "r1", 5, "Network error"),
    ]);
    harness.provider.fail_uploads_with("still offline");

    for _ in 0..5 {
        harness.engine.retry_failed_syncs(None).await.unwrap();
    }

    let attempted: Vec<String> = harness
        .provider
        .upload_calls()
        .into_iter()
        .map(|c| c.local_ref)
        .collect();
    assert_eq!(attempted, vec!["local://a.jpg", "local://a.jpg"]);
    assert_eq!(harness.record("local://a.jpg").unwrap().retry_count, 3);
    assert_eq!(harness.record("local://b.jpg").unwrap().retry_count, 3);
    assert_eq!(harness.record("local://c.jpg").unwrap().retry_count, 5);
}

#[tokio::test(start_paused = true)]
async fn retry_recovers_failed_images() {
    let harness = Harness::new();
    harness.seed([
        records::failed("local://a.jpg", "r1", 1, "Network error"),
        records::failed("local://b.jpg", "r2", 2, "timeout"),
        records::pending("local://c.jpg", "r1"),
    ]);
    harness.provider.fail_upload_for("local://b.jpg", "quota exceeded");

    let report = harness.engine.retry_failed_syncs(None).await.unwrap();
    assert_eq!(report.eligible, 2);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed, 1);
    assert!(!report.is_clean());

    let a = harness.record("local://a.jpg").unwrap();
    assert!(a.is_synced);
    assert!(!a.has_error);
    assert!(a.error_message.is_none());

    let b = harness.record("local://b.jpg").unwrap();
    assert_eq!(b.error_message.as_deref(), Some("quota exceeded"));
    assert_eq!(b.retry_count, 3);

    // Pending images are not touched by a retry.
    assert_eq!(harness.record("local://c.jpg").unwrap().retry_count, 0);
}

#[tokio::test]
async fn empty_batches_succeed_without_work() {
    let harness = Harness::new();
    let report = harness.engine.retry_failed_syncs(None).await.unwrap();
    assert_eq!(report.eligible, 0);
    assert_eq!(report.chunks, 0);

    let report = harness.engine.sync_pending_images(None).await.unwrap();
    assert_eq!(report.attempted, 0);
    assert_eq!(harness.provider.upload_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn overlapping_batches_are_serialized() {
    let harness = Harness::with_config(SyncConfig::new().with_batch_size(2));
    harness.seed(records::pending_batch("img", "r1", 4));
    harness.provider.set_latency(Duration::from_millis(100));

    let (first, second) = tokio::join!(
        harness.engine.sync_pending_images(None),
        harness.engine.sync_pending_images(None),
    );
    let (first, second) = (first.unwrap(), second.unwrap());

    assert_eq!(first.succeeded, 4);
    assert_eq!(second.eligible, 0);
    assert_eq!(harness.provider.upload_count(), 4);
    assert_eq!(harness.provider.peak_concurrency(), 2);
    assert_eq!(harness.engine.stats().batches_run, 2);
}

#[tokio::test(start_paused = true)]
async fn exponential_backoff_stretches_pauses() {
    let harness = Harness::new();
    let engine = SyncOrchestrator::with_clock(
        Arc::clone(&harness.config),
        Arc::clone(&harness.provider),
        Arc::clone(&harness.store),
        harness.clock.clone(),
    )
    .unwrap()
    .with_backoff(ExponentialBackoff::new(2.0));
    harness.config
        .update(SyncConfig::new().with_retry_delay(Duration::from_millis(500)))
        .unwrap();
    harness.seed(records::pending_batch("img", "r1", 4));

    let start = tokio::time::Instant::now();
    engine.sync_pending_images(Some(1)).await.unwrap();

    assert_eq!(
        offsets_ms(&harness.provider, start),
        vec![0, 500, 1500, 3500]
    );
}

#[tokio::test]
async fn status_never_fails() {
    let harness = Harness::new();
    harness.seed(records::pending_batch("img", "r1", 2));
    harness.engine.sync_image("local://img-0.jpg", "r1").await.unwrap();

    harness.store.fail_reads(true);
    let status = harness.engine.get_sync_status();
    assert_eq!(status.total, 0);
    assert_eq!(status.percentage, 0);
    assert!(!status.is_syncing);
    assert!(!harness.engine.is_image_synced("img-0_1.jpg"));

    harness.store.fail_reads(false);
    assert_eq!(harness.engine.get_sync_status().total, 2);
    assert!(harness.engine.is_image_synced("img-0_1.jpg"));
}

#[tokio::test]
async fn batch_fails_when_records_cannot_be_read() {
    let harness = Harness::new();
    harness.store.fail_reads(true);

    let err = harness.engine.sync_pending_images(None).await.unwrap_err();
    assert!(matches!(err, SyncError::Storage(_)));
    let err = harness.engine.retry_failed_syncs(None).await.unwrap_err();
    assert!(matches!(err, SyncError::Storage(_)));
}

#[tokio::test]
async fn cache_write_failure_does_not_fail_url_lookup() {
    let harness = Harness::new();
    harness.store.fail_writes(true);

    let url = harness.engine.get_image_url("x.jpg").await.unwrap();
    assert_eq!(url, "https://storage.example.com/images/x.jpg");
}

#[tokio::test]
async fn upload_limits_come_from_config() {
    let harness = Harness::with_config(
        SyncConfig::new().with_allowed_content_types(["image/png"]),
    );

    let err = harness
        .engine
        .sync_image("local://a.jpg", "r1")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("image/jpeg"));

    harness.provider.set_upload_metadata(4096, "image/png");
    assert!(harness.engine.sync_image("local://a.jpg", "r1").await.is_ok());
    let record = harness.record("local://a.jpg").unwrap();
    assert_eq!(record.retry_count, 2);
    assert_eq!(record.content_type.as_deref(), Some("image/png"));
    assert_eq!(record.file_size, Some(4096));
}

#[tokio::test]
async fn clearing_an_owner_leaves_others() {
    let harness = Harness::new();
    harness.engine.sync_image("local://a.jpg", "r1").await.unwrap();
    harness.engine.sync_image("local://b.jpg", "r1").await.unwrap();
    harness.engine.sync_image("local://c.jpg", "r2").await.unwrap();

    assert_eq!(harness.engine.clear_sync_records("r1").unwrap(), 2);
    assert_eq!(harness.engine.get_sync_status().total, 1);
    assert!(harness.engine.get_cached_image_url("a_1.jpg").unwrap().is_some());
    assert!(harness.engine.clear_sync_records("").is_err());
}

#[tokio::test]
async fn state_survives_restart() {
    let temp = TempStore::new();
    let provider = Arc::new(MockProvider::new());
    {
        let engine =
            SyncOrchestrator::new(SyncConfig::default(), Arc::clone(&provider), temp.open())
                .unwrap();
        engine.sync_image("local://a.jpg", "r1").await.unwrap();
    }

    let engine =
        SyncOrchestrator::new(SyncConfig::default(), Arc::clone(&provider), temp.open()).unwrap();
    assert_eq!(engine.sync_image("local://a.jpg", "r1").await.unwrap(), "a_1.jpg");
    assert_eq!(provider.upload_count(), 1);
    assert_eq!(
        engine.get_image_url("a_1.jpg").await.unwrap(),
        "https://storage.example.com/images/a_1.jpg"
    );
    assert_eq!(provider.url_fetches().len(), 1);
}

#[tokio::test]
async fn legacy_records_are_migrated_on_open() {
    let temp = TempStore::new();
    let legacy = vec![
        records::synced("local://a.jpg", "r1", "a_9.jpg", epoch()),
        records::failed("local://b.jpg", "r1", 1, "Network error"),
    ];
    temp.open()
        .set(LEGACY_RECORDS_KEY, &serde_json::to_string(&legacy).unwrap())
        .unwrap();

    let engine = SyncOrchestrator::with_shared_config(
        ConfigManager::shared(SyncConfig::default()).unwrap(),
        MockProvider::new(),
        temp.open(),
    )
    .unwrap();

    let status = engine.get_sync_status();
    assert_eq!(status.total, 2);
    assert_eq!(status.synced, 1);
    assert_eq!(status.failed, 1);
    assert!(temp.open().get(LEGACY_RECORDS_KEY).unwrap().is_none());
    assert_eq!(engine.sync_image("local://a.jpg", "r1").await.unwrap(), "a_9.jpg");
}

#[tokio::test]
async fn long_file_uri_syncs_on_disk() {
    assert!(PICKER_REF.len() > 150);
    let temp = TempStore::new();
    let provider = Arc::new(MockProvider::new());
    {
        let engine =
            SyncOrchestrator::new(SyncConfig::default(), Arc::clone(&provider), temp.open())
                .unwrap();
        let name = engine.sync_image(PICKER_REF, "r1").await.unwrap();
        assert_eq!(name, "b81c47d2-09e5-4f6a-a3d1-6c2e8f4b7a90_1.jpg");
    }

    let engine =
        SyncOrchestrator::new(SyncConfig::default(), Arc::clone(&provider), temp.open()).unwrap();
    let record = engine.records().get(PICKER_REF).unwrap().unwrap();
    assert!(record.is_synced);
    assert_eq!(engine.get_sync_status().synced, 1);
    assert_eq!(provider.upload_count(), 1);
}

#[tokio::test]
async fn legacy_long_refs_are_migrated_on_disk() {
    let temp = TempStore::new();
    let legacy = vec![
        records::pending("local://a.jpg", "r1"),
        records::failed(PICKER_REF, "r1", 1, "Network error"),
    ];
    temp.open()
        .set(LEGACY_RECORDS_KEY, &serde_json::to_string(&legacy).unwrap())
        .unwrap();

    let engine =
        SyncOrchestrator::new(SyncConfig::default(), MockProvider::new(), temp.open()).unwrap();

    let status = engine.get_sync_status();
    assert_eq!(status.total, 2);
    assert_eq!(status.pending, 1);
    assert_eq!(status.failed, 1);
    assert!(temp.open().get(LEGACY_RECORDS_KEY).unwrap().is_none());

    let report = engine.retry_failed_syncs(None).await.unwrap();
    assert_eq!(report.succeeded, 1);
    assert!(engine.records().get(PICKER_REF).unwrap().unwrap().is_synced);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn status_matches_seeded_records(records in record_set_strategy(24)) {
        let harness = Harness::new();
        harness.seed(records.clone());
        let status = harness.engine.get_sync_status();

        prop_assert_eq!(status.total, records.len());
        prop_assert_eq!(
            status.synced,
            records.iter().filter(|r| r.is_synced).count()
        );
        prop_assert_eq!(
            status.synced + status.failed + status.syncing + status.pending,
            status.total
        );
    }

    #[test]
    fn synced_records_never_reupload(records in record_set_strategy(12)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap();
        let harness = Harness::new();
        harness.seed(records.clone());

        runtime.block_on(async {
            for record in records.iter().filter(|r| r.is_synced) {
                let name = harness
                    .engine
                    .sync_image(&record.local_ref, &record.owner_id)
                    .await
                    .unwrap();
                assert_eq!(Some(name), record.remote_name.clone());
            }
        });
        prop_assert_eq!(harness.provider.upload_count(), 0);
    }

    #[test]
    fn round_trip_through_the_store(record in record_strategy()) {
        let harness = Harness::new();
        harness.seed([record.clone()]);
        let back: SyncRecord = harness.record(&record.local_ref).unwrap();
        prop_assert_eq!(back, record);
    }

    #[test]
    fn round_trip_through_the_file_store(records in record_set_strategy(8)) {
        let temp = TempStore::new();
        let store = SyncRecordStore::new(temp.open());
        for record in &records {
            store.upsert(record).unwrap();
        }

        let reopened = SyncRecordStore::open(temp.open()).unwrap();
        let mut expected = records.clone();
        expected.sort_by(|a, b| a.local_ref.cmp(&b.local_ref));
        prop_assert_eq!(reopened.get_all().unwrap(), expected);
        for record in &records {
            let fetched = reopened.get(&record.local_ref).unwrap();
            prop_assert_eq!(fetched.as_ref(), Some(record));
        }
    }
}
