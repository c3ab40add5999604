//! Chunked pump from the producer pipe to the transport pipe

use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{Mutex, MutexGuard};

use crate::notifications::api::{AsyncNotificationManager, Event, ProgressEvent};
use crate::ops::OpToken;
use crate::relay::{PipeReader, PipeWriter};
use crate::transport::{Transport, TransportStatus};

/// Cancellation state shared between the cancel entry point and the pump
#[derive(Debug, Default)]
pub struct CancelFlags {
    /// Whole-run cancellation observed.
    pub cancel_all: bool,
    /// Registry token of the runner currently in flight, if any.
    pub in_flight_op: Option<OpToken>,
}

/// The single mutex guarding the cancel flags
///
/// Held across the transport calls that must be atomic with respect to the
/// cancel flag, so a cancellation either happens strictly before a chunk's
/// write-and-notify pair or strictly after it.
pub struct CancelGate {
    inner: Mutex<CancelFlags>,
}

impl CancelGate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(CancelFlags::default()),
        })
    }

    pub async fn lock(&self) -> MutexGuard<'_, CancelFlags> {
        self.inner.lock().await
    }

    pub async fn is_cancelled(&self) -> bool {
        self.inner.lock().await.cancel_all
    }

    pub async fn set_cancelled(&self) {
        self.inner.lock().await.cancel_all = true;
    }
}

/// Result of one pump pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PumpOutcome {
    /// Terminal transport-side status. `Ok` means the pump saw EOF (or a
    /// cancellation, which leaves the status untouched).
    pub status: TransportStatus,
    /// Cumulative bytes moved downstream.
    pub bytes_moved: u64,
}

/// Moves bytes from the producer-side pipe to the transport-side pipe
///
/// Runs on the orchestrator's task, one pass per producer. Constructed once
/// per run; all per-producer state lives in the pass.
pub struct RelayPump {
    chunk_size: usize,
    transport: Arc<dyn Transport>,
    cancel: Arc<CancelGate>,
    notifications: Arc<Mutex<AsyncNotificationManager>>,
}

impl RelayPump {
    pub fn new(
        chunk_size: usize,
        transport: Arc<dyn Transport>,
        cancel: Arc<CancelGate>,
        notifications: Arc<Mutex<AsyncNotificationManager>>,
    ) -> Self {
        Self {
            chunk_size,
            transport,
            cancel,
            notifications,
        }
    }

    /// Pump until producer EOF, a non-OK transport status, or cancellation.
    ///
    /// `quota` is enforced on the running total even though preflight
    /// already approved an estimate: the estimate is advisory, the quota is
    /// not. `expected` (the preflight estimate) only feeds progress events;
    /// zero suppresses them.
    pub async fn run(
        &self,
        producer: &str,
        source: &mut PipeReader,
        sink: &mut PipeWriter,
        quota: u64,
        expected: u64,
    ) -> PumpOutcome {
        let mut buffer = vec![0u8; self.chunk_size];
        let mut total: u64 = 0;
        let mut status = TransportStatus::Ok;

        loop {
            let n = match source.read(&mut buffer).await {
                Ok(0) => break,
                Ok(n) => n,
                Err(err) => {
                    log::warn!("Error reading producer pipe for {}: {}", producer, err);
                    status = TransportStatus::TransportError;
                    break;
                }
            };

            {
                let flags = self.cancel.lock().await;
                if flags.cancel_all {
                    // Cancellation has already torn down the transport link;
                    // neither the write nor the notify may be attempted.
                    break;
                }
                if let Err(err) = sink.write_all(&buffer[..n]).await {
                    log::warn!("Error writing transport pipe for {}: {}", producer, err);
                    status = TransportStatus::TransportError;
                    break;
                }
                status = self.transport.send_chunk_notify(n as u64).await;
            }

            total += n as u64;
            log::trace!("relayed {} bytes for {} (total {})", n, producer, total);

            if status.is_ok() && total > quota {
                log::warn!(
                    "Producer {} hit quota limit in-flight: {} of {}",
                    producer,
                    total,
                    quota
                );
                status = TransportStatus::QuotaExceeded;
            }

            if expected > 0 {
                self.publish_progress(producer, expected, total).await;
            }

            if !status.is_ok() {
                break;
            }
        }

        PumpOutcome {
            status,
            bytes_moved: total,
        }
    }

    async fn publish_progress(&self, producer: &str, expected: u64, sent: u64) {
        let event = Event::Progress(ProgressEvent::new(producer, expected, sent));
        if let Err(err) = self.notifications.lock().await.publish(event).await {
            log::debug!("progress event for {} not delivered: {}", producer, err);
        }
    }
}
