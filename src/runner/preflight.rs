//! Preflight size estimation for one producer attempt

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::core::sync::OnceLatch;
use crate::ops::{BackupTask, OpCompletion, OpKind, OpRegistry, OpToken};
use crate::producer::{Producer, ProducerEngine};
use crate::transport::{BackupOutcome, Transport, TransportStatus};

/// Raw measurement codes on the engine completion channel. Non-negative
/// values are byte counts.
pub(crate) const RESULT_AGENT_ERROR: i64 = -1;
pub(crate) const RESULT_CANCELLED: i64 = -2;

/// Asks a producer for its expected size and validates it with the transport
///
/// The measurement itself runs in the producer's agent; this side registers
/// a cancelable operation with a backstop timer, hands the engine a
/// completion handle, and parks on a one-shot latch that is satisfied by
/// whichever of {engine callback, cancellation, backstop} wins.
pub struct PreflightEstimator {
    engine: Arc<dyn ProducerEngine>,
    transport: Arc<dyn Transport>,
    registry: Arc<OpRegistry>,
    quota: u64,
    backstop: Duration,
    result: OnceLatch<i64>,
    token: AtomicU64,
}

impl PreflightEstimator {
    pub fn new(
        engine: Arc<dyn ProducerEngine>,
        transport: Arc<dyn Transport>,
        registry: Arc<OpRegistry>,
        quota: u64,
        backstop: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            engine,
            transport,
            registry,
            quota,
            backstop,
            result: OnceLatch::new(),
            token: AtomicU64::new(0),
        })
    }

    /// Registry token of the in-flight measurement; zero until `run` starts.
    pub fn token(&self) -> OpToken {
        self.token.load(Ordering::SeqCst)
    }

    /// Run the preflight pass: measure, then validate with the transport.
    ///
    /// A backstop expiry resolves to the same failure code as an agent
    /// error; the log line is the only place the two stay distinguishable.
    pub async fn run(self: &Arc<Self>, producer: &Producer) -> Result<u64, BackupOutcome> {
        let token = self.registry.register_with_timeout(
            Arc::clone(self) as Arc<dyn BackupTask>,
            OpKind::Wait,
            self.backstop,
        );
        self.token.store(token, Ordering::SeqCst);
        log::debug!("Preflighting full payload of {}", producer.name());

        let completion = OpCompletion::new(Arc::clone(&self.registry), token);
        if let Err(err) = self
            .engine
            .measure_expected_size(producer, self.quota, completion)
            .await
        {
            log::warn!("Error preflighting {}: {}", producer.name(), err);
            self.registry.unregister(token);
            return Err(BackupOutcome::AgentError);
        }

        let raw = match self.result.wait_timeout(self.backstop).await {
            Some(value) => value,
            None => {
                log::warn!(
                    "Preflight backstop elapsed for {}; treating as agent failure",
                    producer.name()
                );
                RESULT_AGENT_ERROR
            }
        };
        self.registry.unregister(token);

        if raw == RESULT_CANCELLED {
            return Err(BackupOutcome::Cancelled);
        }
        if raw < 0 {
            log::debug!("Preflight of {} failed with code {}", producer.name(), raw);
            return Err(BackupOutcome::AgentError);
        }

        let expected = raw as u64;
        log::debug!(
            "Got preflight response for {}; size={}",
            producer.name(),
            expected
        );

        match self.transport.check_full_data_size(expected).await {
            TransportStatus::Ok => Ok(expected),
            TransportStatus::QuotaExceeded => {
                log::debug!(
                    "Producer {} hit quota limit on preflight: {} of {}",
                    producer.name(),
                    expected,
                    self.quota
                );
                // Let the producer abort internally before its slot is torn down
                self.engine
                    .quota_exceeded(producer, expected, self.quota)
                    .await;
                Err(BackupOutcome::QuotaExceeded)
            }
            TransportStatus::PackageRejected => Err(BackupOutcome::PackageRejected),
            TransportStatus::TransportError => Err(BackupOutcome::TransportAborted),
        }
    }
}

#[async_trait]
impl BackupTask for PreflightEstimator {
    async fn operation_complete(&self, result: i64) {
        log::trace!("Preflight op complete, result={}", result);
        self.result.set(result);
        self.registry.unregister(self.token());
    }

    async fn handle_cancel(&self, cancel_all: bool) {
        log::debug!("Preflight cancelled; failing");
        let code = if cancel_all {
            RESULT_CANCELLED
        } else {
            // Backstop timeout: indistinguishable from a broken agent
            RESULT_AGENT_ERROR
        };
        self.result.set(code);
        self.registry.unregister(self.token());
    }
}
