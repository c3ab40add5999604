//! Scripted doubles for the engine's external seams
//!
//! Each double is configured per producer name before the run and records
//! every call it sees, so scenarios can assert both outcomes and the exact
//! transport/engine interaction sequence.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc::UnboundedReceiver;

use backrelay::notifications::api::{AsyncNotificationManager, Event, EventFilter};
use backrelay::ops::OpCompletion;
use backrelay::orchestrator::{RunLifecycle, RunScheduler};
use backrelay::producer::{EngineError, Producer, ProducerEngine};
use backrelay::relay::{PipeReader, PipeWriter};
use backrelay::transport::{BackupOutcome, TransferFlags, Transport, TransportStatus};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Transport double with per-producer scripted answers
///
/// Accepted transfers get their pipe read end drained on a background task,
/// mirroring a remote side that consumes whatever the relay sends.
pub struct ScriptedTransport {
    quota: u64,
    delay_hint: Duration,
    begin_overrides: Mutex<HashMap<String, TransportStatus>>,
    size_overrides: Mutex<HashMap<String, TransportStatus>>,
    /// Fail the k-th chunk notify (1-based) of a producer with this status.
    notify_scripts: Mutex<HashMap<String, (usize, TransportStatus)>>,
    current: Mutex<Option<String>>,
    current_notifies: AtomicUsize,
    current_bytes: AtomicU64,
    begins: Mutex<Vec<String>>,
    finishes: AtomicUsize,
    cancels: AtomicUsize,
    notified_bytes: AtomicU64,
}

impl ScriptedTransport {
    pub fn new(quota: u64) -> Arc<Self> {
        Arc::new(Self {
            quota,
            delay_hint: Duration::from_secs(60),
            begin_overrides: Mutex::new(HashMap::new()),
            size_overrides: Mutex::new(HashMap::new()),
            notify_scripts: Mutex::new(HashMap::new()),
            current: Mutex::new(None),
            current_notifies: AtomicUsize::new(0),
            current_bytes: AtomicU64::new(0),
            begins: Mutex::new(Vec::new()),
            finishes: AtomicUsize::new(0),
            cancels: AtomicUsize::new(0),
            notified_bytes: AtomicU64::new(0),
        })
    }

    pub fn reject_begin(&self, producer: &str, status: TransportStatus) {
        lock(&self.begin_overrides).insert(producer.to_string(), status);
    }

    pub fn reject_size(&self, producer: &str, status: TransportStatus) {
        lock(&self.size_overrides).insert(producer.to_string(), status);
    }

    pub fn fail_notify(&self, producer: &str, at: usize, status: TransportStatus) {
        lock(&self.notify_scripts).insert(producer.to_string(), (at, status));
    }

    pub fn begins(&self) -> Vec<String> {
        lock(&self.begins).clone()
    }

    pub fn begin_count(&self) -> usize {
        lock(&self.begins).len()
    }

    pub fn finish_count(&self) -> usize {
        self.finishes.load(Ordering::SeqCst)
    }

    pub fn cancel_count(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }

    pub fn notified_total(&self) -> u64 {
        self.notified_bytes.load(Ordering::SeqCst)
    }

    pub fn delay_hint(&self) -> Duration {
        self.delay_hint
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn begin_full_backup(
        &self,
        producer: &Producer,
        mut data: PipeReader,
        _flags: TransferFlags,
    ) -> TransportStatus {
        let name = producer.name().to_string();
        lock(&self.begins).push(name.clone());

        if let Some(status) = lock(&self.begin_overrides).get(&name) {
            return *status;
        }

        *lock(&self.current) = Some(name);
        self.current_notifies.store(0, Ordering::SeqCst);
        self.current_bytes.store(0, Ordering::SeqCst);
        tokio::spawn(async move {
            let mut sink = Vec::new();
            let _ = data.read_to_end(&mut sink).await;
        });
        TransportStatus::Ok
    }

    async fn get_quota(&self, _producer: &Producer) -> u64 {
        self.quota
    }

    async fn check_full_data_size(&self, bytes: u64) -> TransportStatus {
        let current = lock(&self.current).clone();
        if let Some(name) = current {
            if let Some(status) = lock(&self.size_overrides).get(&name) {
                return *status;
            }
        }
        if bytes > self.quota {
            TransportStatus::QuotaExceeded
        } else {
            TransportStatus::Ok
        }
    }

    async fn send_chunk_notify(&self, bytes: u64) -> TransportStatus {
        let seen = self.current_notifies.fetch_add(1, Ordering::SeqCst) + 1;
        let total = self.current_bytes.fetch_add(bytes, Ordering::SeqCst) + bytes;
        self.notified_bytes.fetch_add(bytes, Ordering::SeqCst);

        let current = lock(&self.current).clone();
        if let Some(name) = current {
            if let Some((at, status)) = lock(&self.notify_scripts).get(&name) {
                if seen >= *at {
                    return *status;
                }
            }
        }
        if total > self.quota {
            return TransportStatus::QuotaExceeded;
        }
        TransportStatus::Ok
    }

    async fn finish_backup(&self) -> TransportStatus {
        self.finishes.fetch_add(1, Ordering::SeqCst);
        *lock(&self.current) = None;
        TransportStatus::Ok
    }

    async fn cancel_full_backup(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        *lock(&self.current) = None;
    }

    async fn request_next_delay(&self) -> Duration {
        self.delay_hint
    }
}

/// Engine double with per-producer payloads and failure scripts
pub struct ScriptedEngine {
    payloads: Mutex<HashMap<String, Vec<u8>>>,
    measure_overrides: Mutex<HashMap<String, i64>>,
    /// Producers whose stream trickles forever until torn down or cancelled.
    hang_streams: Mutex<HashSet<String>>,
    torn: Mutex<HashSet<String>>,
    measures: Mutex<Vec<String>>,
    streams: Mutex<Vec<String>>,
    teardowns: Mutex<Vec<String>>,
    unbinds: Mutex<Vec<String>>,
    quota_notices: Mutex<Vec<(String, u64, u64)>>,
}

impl ScriptedEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            payloads: Mutex::new(HashMap::new()),
            measure_overrides: Mutex::new(HashMap::new()),
            hang_streams: Mutex::new(HashSet::new()),
            torn: Mutex::new(HashSet::new()),
            measures: Mutex::new(Vec::new()),
            streams: Mutex::new(Vec::new()),
            teardowns: Mutex::new(Vec::new()),
            unbinds: Mutex::new(Vec::new()),
            quota_notices: Mutex::new(Vec::new()),
        })
    }

    pub fn set_payload(&self, producer: &str, payload: Vec<u8>) {
        lock(&self.payloads).insert(producer.to_string(), payload);
    }

    /// Force the measurement to report this raw code instead of the payload
    /// length (negative values are failure codes).
    pub fn override_measure(&self, producer: &str, result: i64) {
        lock(&self.measure_overrides).insert(producer.to_string(), result);
    }

    pub fn hang_stream(&self, producer: &str) {
        lock(&self.hang_streams).insert(producer.to_string());
    }

    pub fn measures(&self) -> Vec<String> {
        lock(&self.measures).clone()
    }

    pub fn streams(&self) -> Vec<String> {
        lock(&self.streams).clone()
    }

    pub fn teardowns(&self) -> Vec<String> {
        lock(&self.teardowns).clone()
    }

    pub fn unbinds(&self) -> Vec<String> {
        lock(&self.unbinds).clone()
    }

    pub fn quota_notices(&self) -> Vec<(String, u64, u64)> {
        lock(&self.quota_notices).clone()
    }

    fn is_torn(&self, producer: &str) -> bool {
        lock(&self.torn).contains(producer)
    }
}

#[async_trait]
impl ProducerEngine for ScriptedEngine {
    async fn measure_expected_size(
        &self,
        producer: &Producer,
        _quota: u64,
        completion: OpCompletion,
    ) -> Result<(), EngineError> {
        let name = producer.name().to_string();
        lock(&self.measures).push(name.clone());

        let result = match lock(&self.measure_overrides).get(&name) {
            Some(code) => *code,
            None => lock(&self.payloads)
                .get(&name)
                .map(|p| p.len() as i64)
                .unwrap_or(0),
        };
        tokio::spawn(async move {
            completion.complete(result).await;
        });
        Ok(())
    }

    async fn stream_full_data(
        &self,
        producer: &Producer,
        mut out: PipeWriter,
        _quota: u64,
    ) -> Result<(), EngineError> {
        let name = producer.name().to_string();
        lock(&self.streams).push(name.clone());

        if lock(&self.hang_streams).contains(&name) {
            loop {
                if self.is_torn(&name) {
                    return Err(EngineError::new("agent torn down"));
                }
                out.write_all(&[0u8; 256])
                    .await
                    .map_err(|e| EngineError::new(e.to_string()))?;
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        }

        let payload = lock(&self.payloads).get(&name).cloned().unwrap_or_default();
        out.write_all(&payload)
            .await
            .map_err(|e| EngineError::new(e.to_string()))?;
        Ok(())
    }

    async fn quota_exceeded(&self, producer: &Producer, bytes: u64, quota: u64) {
        lock(&self.quota_notices).push((producer.name().to_string(), bytes, quota));
        lock(&self.torn).insert(producer.name().to_string());
    }

    async fn tear_down(&self, producer: &Producer) {
        lock(&self.teardowns).push(producer.name().to_string());
        lock(&self.torn).insert(producer.name().to_string());
    }

    async fn unbind(&self, producer: &Producer) {
        lock(&self.unbinds).push(producer.name().to_string());
        lock(&self.torn).remove(producer.name());
    }
}

/// Scheduler that records every call
#[derive(Default)]
pub struct RecordingScheduler {
    scheduled: Mutex<Vec<Duration>>,
    requeued: Mutex<Vec<String>>,
}

impl RecordingScheduler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn scheduled(&self) -> Vec<Duration> {
        lock(&self.scheduled).clone()
    }

    pub fn requeued(&self) -> Vec<String> {
        lock(&self.requeued).clone()
    }
}

#[async_trait]
impl RunScheduler for RecordingScheduler {
    async fn schedule_next_run(&self, delay: Duration) {
        lock(&self.scheduled).push(delay);
    }

    async fn requeue_producer(&self, producer: &str) {
        lock(&self.requeued).push(producer.to_string());
    }
}

/// Lifecycle guard that records acquire/release pairing
pub struct RecordingLifecycle {
    allow: bool,
    acquires: AtomicUsize,
    releases: AtomicUsize,
}

impl RecordingLifecycle {
    pub fn granting() -> Arc<Self> {
        Arc::new(Self {
            allow: true,
            acquires: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
        })
    }

    pub fn denying() -> Arc<Self> {
        Arc::new(Self {
            allow: false,
            acquires: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
        })
    }

    pub fn acquire_count(&self) -> usize {
        self.acquires.load(Ordering::SeqCst)
    }

    pub fn release_count(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RunLifecycle for RecordingLifecycle {
    async fn try_acquire(&self) -> bool {
        self.acquires.fetch_add(1, Ordering::SeqCst);
        self.allow
    }

    async fn release(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

/// Subscribe to per-producer outcome events on a fresh manager.
pub async fn subscribe_packages(
    notifications: &Arc<tokio::sync::Mutex<AsyncNotificationManager>>,
    subscriber_id: &str,
) -> UnboundedReceiver<Event> {
    notifications.lock().await.subscribe(
        subscriber_id.to_string(),
        EventFilter::PackageOnly,
        "integration-test".to_string(),
    )
}

/// Drain the buffered package events into `(producer, outcome)` pairs.
pub fn drain_package_outcomes(
    receiver: &mut UnboundedReceiver<Event>,
) -> Vec<(String, BackupOutcome)> {
    let mut outcomes = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        if let Event::Package(package) = event {
            outcomes.push((package.producer, package.outcome));
        }
    }
    outcomes
}
