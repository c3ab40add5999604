//! Worker task driving one producer's backup attempt

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::core::sync::OnceLatch;
use crate::ops::{BackupTask, OpKind, OpRegistry, OpToken};
use crate::producer::{Producer, ProducerEngine};
use crate::relay::PipeWriter;
use crate::runner::PreflightEstimator;
use crate::transport::{BackupOutcome, Transport};

/// Backstop bounds for the runner's blocking join points
///
/// Reaching a backstop resolves the wait to the same failure outcome as an
/// explicit agent error; no wait in the engine is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackupTimeouts {
    /// Bound on the preflight phase and on `wait_preflight_result`.
    pub preflight: Duration,
    /// Bound on `wait_final_result` once the attempt is being joined.
    pub transfer: Duration,
}

impl Default for BackupTimeouts {
    fn default() -> Self {
        Self {
            preflight: Duration::from_secs(300),
            transfer: Duration::from_secs(300),
        }
    }
}

/// Drives one producer's preflight and transfer on a spawned worker task
///
/// The orchestrator joins the attempt through [`wait_preflight_result`] and
/// [`wait_final_result`]; both are latch-backed, bounded, and released
/// exactly once by whichever of normal completion, cancellation, or backstop
/// expiry happens first. Engine failures never escape the worker: they are
/// classified as agent errors and finalized through the same single path.
///
/// [`wait_preflight_result`]: ProducerRunner::wait_preflight_result
/// [`wait_final_result`]: ProducerRunner::wait_final_result
pub struct ProducerRunner {
    producer: Producer,
    engine: Arc<dyn ProducerEngine>,
    registry: Arc<OpRegistry>,
    preflight: Arc<PreflightEstimator>,
    quota: u64,
    timeouts: BackupTimeouts,
    preflight_result: OnceLatch<Result<u64, BackupOutcome>>,
    final_result: OnceLatch<BackupOutcome>,
    cancel_signal: OnceLatch<()>,
    cancelled: AtomicBool,
    token: AtomicU64,
}

impl ProducerRunner {
    pub fn new(
        producer: Producer,
        engine: Arc<dyn ProducerEngine>,
        transport: Arc<dyn Transport>,
        registry: Arc<OpRegistry>,
        quota: u64,
        timeouts: BackupTimeouts,
    ) -> Arc<Self> {
        let preflight = PreflightEstimator::new(
            Arc::clone(&engine),
            transport,
            Arc::clone(&registry),
            quota,
            timeouts.preflight,
        );
        Arc::new(Self {
            producer,
            engine,
            registry,
            preflight,
            quota,
            timeouts,
            preflight_result: OnceLatch::new(),
            final_result: OnceLatch::new(),
            cancel_signal: OnceLatch::new(),
            cancelled: AtomicBool::new(false),
            token: AtomicU64::new(0),
        })
    }

    /// Register with the operation registry and start the worker task.
    ///
    /// Registration happens before the task is spawned, so the returned
    /// token is cancelable by the time any wait on this runner can begin.
    /// The worker owns `out` and drops it when the attempt concludes, which
    /// is how the relay pump observes end-of-data.
    pub fn spawn(self: &Arc<Self>, out: PipeWriter) -> OpToken {
        let token = self
            .registry
            .register(Arc::clone(self) as Arc<dyn BackupTask>, OpKind::Wait);
        self.token.store(token, Ordering::SeqCst);

        let runner = Arc::clone(self);
        tokio::spawn(async move {
            runner.run_attempt(out).await;
        });
        token
    }

    /// Registry token of this runner; zero until `spawn` has run.
    pub fn token(&self) -> OpToken {
        self.token.load(Ordering::SeqCst)
    }

    /// Block until the preflight phase concludes.
    ///
    /// `Ok(expected)` carries the estimated byte count; `Err` carries the
    /// failure outcome, `Cancelled` if the runner was cancelled first, or
    /// `AgentError` if the backstop elapsed with no verdict at all.
    pub async fn wait_preflight_result(&self) -> Result<u64, BackupOutcome> {
        match self
            .preflight_result
            .wait_timeout(self.timeouts.preflight)
            .await
        {
            Some(result) => result,
            None => {
                log::warn!(
                    "No preflight verdict for {} within backstop; treating as agent failure",
                    self.producer.name()
                );
                Err(BackupOutcome::AgentError)
            }
        }
    }

    /// Block until the whole attempt concludes.
    pub async fn wait_final_result(&self) -> BackupOutcome {
        match self.final_result.wait_timeout(self.timeouts.transfer).await {
            Some(outcome) => outcome,
            None => {
                log::warn!(
                    "No final verdict for {} within backstop; treating as agent failure",
                    self.producer.name()
                );
                BackupOutcome::AgentError
            }
        }
    }

    /// Tell the producer its transfer crossed the quota mid-stream.
    pub async fn send_quota_exceeded(&self, bytes: u64, quota: u64) {
        self.engine
            .quota_exceeded(&self.producer, bytes, quota)
            .await;
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    async fn run_attempt(self: Arc<Self>, out: PipeWriter) {
        let preflight = if self.is_cancelled() {
            Err(BackupOutcome::Cancelled)
        } else {
            self.preflight.run(&self.producer).await
        };
        // Release the preflight join point no matter how the phase ended.
        self.preflight_result.set(preflight);

        let outcome = match preflight {
            Ok(_) if !self.is_cancelled() => self.transfer(out).await,
            Ok(_) => BackupOutcome::Cancelled,
            Err(code) => code,
        };
        self.finalize(outcome);
    }

    async fn transfer(&self, out: PipeWriter) -> BackupOutcome {
        let streamed = tokio::select! {
            result = self.engine.stream_full_data(&self.producer, out, self.quota) => result,
            _ = self.cancel_signal.wait() => {
                return BackupOutcome::Cancelled;
            }
        };

        match streamed {
            Ok(()) => BackupOutcome::Success,
            Err(err) => {
                log::error!(
                    "Error during full package backup of {}: {}",
                    self.producer.name(),
                    err
                );
                BackupOutcome::AgentError
            }
        }
    }

    /// Single finalization path: every attempt, however it ended, releases
    /// the final latch here (or already lost the race to a cancellation).
    fn finalize(&self, outcome: BackupOutcome) {
        self.registry.unregister(self.token());
        if self.final_result.set(outcome) {
            log::debug!(
                "Runner for {} finished with outcome {}",
                self.producer.name(),
                outcome
            );
        }
    }
}

#[async_trait]
impl BackupTask for ProducerRunner {
    async fn operation_complete(&self, _result: i64) {
        // The runner has no callback-style results of its own; measurement
        // completions land on the preflight estimator's token.
    }

    async fn handle_cancel(&self, cancel_all: bool) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            log::debug!(
                "Ignoring duplicate cancel for runner of {}",
                self.producer.name()
            );
            return;
        }
        log::warn!("Full backup cancel of {}", self.producer.name());

        // Cancel the ephemeral preflight operation, if one is in flight.
        self.registry.cancel(self.preflight.token(), cancel_all).await;
        self.engine.tear_down(&self.producer).await;

        // Free up everyone waiting on this attempt.
        self.preflight_result.set(Err(BackupOutcome::Cancelled));
        self.final_result.set(BackupOutcome::Cancelled);
        self.cancel_signal.set(());
        self.registry.unregister(self.token());
    }
}
