//! End-to-end runs over the local loopback collaborators
//!
//! Wires the orchestrator to the real `FsProducerEngine` and `DirTransport`
//! the CLI uses, with temp directories on both sides, and checks that bytes
//! actually land committed in the store.

mod common;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use backrelay::local::{DirTransport, FsProducerEngine};
use backrelay::notifications::api::AsyncNotificationManager;
use backrelay::ops::OpRegistry;
use backrelay::orchestrator::{BackupConfig, BackupOrchestrator, NoopLifecycle};
use backrelay::producer::{build_queue, Producer};
use backrelay::transport::{BackupOutcome, RunStatus};

use common::fixtures::{drain_package_outcomes, subscribe_packages, RecordingScheduler};

async fn run_backup(
    queue: Vec<Producer>,
    store: DirTransport,
) -> (RunStatus, Vec<(String, BackupOutcome)>, Vec<Duration>) {
    let notifications = Arc::new(Mutex::new(AsyncNotificationManager::new()));
    let mut events = subscribe_packages(&notifications, "e2e-probe").await;
    let scheduler = RecordingScheduler::new();

    let orchestrator = BackupOrchestrator::new(
        BackupConfig {
            chunk_size: 1024,
            preflight_timeout_secs: 10,
            transfer_timeout_secs: 10,
            ..BackupConfig::default()
        },
        queue,
        Arc::new(FsProducerEngine::new()),
        Arc::new(store),
        OpRegistry::new(),
        notifications,
        Arc::clone(&scheduler) as _,
        Arc::new(NoopLifecycle),
    );

    let status = orchestrator.run().await.unwrap();
    (
        status,
        drain_package_outcomes(&mut events),
        scheduler.scheduled(),
    )
}

#[tokio::test]
async fn test_files_round_trip_into_the_store() {
    let source_dir = tempfile::tempdir().unwrap();
    let store_dir = tempfile::tempdir().unwrap();
    let photos = source_dir.path().join("photos.bin");
    let notes = source_dir.path().join("notes.txt");
    tokio::fs::write(&photos, vec![42u8; 10_000]).await.unwrap();
    tokio::fs::write(&notes, b"remember the milk").await.unwrap();

    let queue = vec![
        Producer::new("photos.bin", photos.to_string_lossy()),
        Producer::new("notes.txt", notes.to_string_lossy()),
    ];
    let store = DirTransport::open(store_dir.path(), u64::MAX).await.unwrap();
    let payload_path = store.payload_path("notes.txt");

    let (status, outcomes, scheduled) = run_backup(queue, store).await;

    assert_eq!(status, RunStatus::Success);
    assert_eq!(
        outcomes,
        vec![
            ("photos.bin".to_string(), BackupOutcome::Success),
            ("notes.txt".to_string(), BackupOutcome::Success),
        ]
    );
    assert_eq!(scheduled.len(), 1);

    // The committed store matches the sources byte for byte.
    let reopened = DirTransport::open(store_dir.path(), u64::MAX).await.unwrap();
    let manifest = reopened.manifest().await.unwrap();
    assert_eq!(manifest.entries.get("photos.bin").unwrap().bytes, 10_000);
    assert_eq!(manifest.entries.get("notes.txt").unwrap().bytes, 17);
    let stored = tokio::fs::read(payload_path).await.unwrap();
    assert_eq!(stored, b"remember the milk");
}

#[tokio::test]
async fn test_oversized_producer_is_rejected_at_preflight() {
    let source_dir = tempfile::tempdir().unwrap();
    let store_dir = tempfile::tempdir().unwrap();
    let big = source_dir.path().join("big.bin");
    let small = source_dir.path().join("small.bin");
    tokio::fs::write(&big, vec![7u8; 5000]).await.unwrap();
    tokio::fs::write(&small, vec![8u8; 100]).await.unwrap();

    let queue = vec![
        Producer::new("big.bin", big.to_string_lossy()),
        Producer::new("small.bin", small.to_string_lossy()),
    ];
    let store = DirTransport::open(store_dir.path(), 1000).await.unwrap();

    let (status, outcomes, _) = run_backup(queue, store).await;

    assert_eq!(status, RunStatus::Success);
    assert_eq!(
        outcomes,
        vec![
            ("big.bin".to_string(), BackupOutcome::QuotaExceeded),
            ("small.bin".to_string(), BackupOutcome::Success),
        ]
    );

    // Nothing of the oversized producer was committed.
    let reopened = DirTransport::open(store_dir.path(), 1000).await.unwrap();
    let manifest = reopened.manifest().await.unwrap();
    assert!(!manifest.entries.contains_key("big.bin"));
    assert_eq!(manifest.entries.get("small.bin").unwrap().bytes, 100);
}

#[tokio::test]
async fn test_eligibility_filter_drops_missing_sources() {
    let source_dir = tempfile::tempdir().unwrap();
    let store_dir = tempfile::tempdir().unwrap();
    let real = source_dir.path().join("real.txt");
    tokio::fs::write(&real, b"present").await.unwrap();

    let candidates = vec![
        Producer::new("real.txt", real.to_string_lossy()),
        Producer::new(
            "ghost.txt",
            source_dir.path().join("ghost.txt").to_string_lossy(),
        ),
    ];
    let queue = build_queue(candidates, |p| std::path::Path::new(p.source()).exists());
    assert_eq!(queue.len(), 1);

    let store = DirTransport::open(store_dir.path(), u64::MAX).await.unwrap();
    let (status, outcomes, _) = run_backup(queue, store).await;

    assert_eq!(status, RunStatus::Success);
    assert_eq!(
        outcomes,
        vec![("real.txt".to_string(), BackupOutcome::Success)]
    );
}
