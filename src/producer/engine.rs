//! The producer engine seam

use async_trait::async_trait;

use crate::ops::OpCompletion;
use crate::producer::Producer;
use crate::relay::PipeWriter;

/// Failure inside a producer engine
///
/// The runner classifies every engine failure as a producer-agent error;
/// the message only feeds logs.
#[derive(Debug, Clone, thiserror::Error)]
#[error("producer engine failure: {message}")]
pub struct EngineError {
    pub message: String,
}

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Drives a producer's agent to measure and stream its backup payload
///
/// One engine serves every producer in a run; per-producer agent state is
/// the engine's own concern.
#[async_trait]
pub trait ProducerEngine: Send + Sync {
    /// Kick off a size measurement for `producer`, bounded by `quota`.
    ///
    /// The result is delivered asynchronously through `completion`: a
    /// non-negative value is the expected byte count, a negative value
    /// signals a measurement failure. An `Err` return means the measurement
    /// could not even be started.
    async fn measure_expected_size(
        &self,
        producer: &Producer,
        quota: u64,
        completion: OpCompletion,
    ) -> Result<(), EngineError>;

    /// Stream the producer's full payload into `out`.
    ///
    /// The engine owns the writer and drops it on return, which is how the
    /// relay pump observes end-of-data. Must stop early (with an error) if
    /// the producer was told to abort via [`quota_exceeded`] or
    /// [`tear_down`].
    ///
    /// [`quota_exceeded`]: ProducerEngine::quota_exceeded
    /// [`tear_down`]: ProducerEngine::tear_down
    async fn stream_full_data(
        &self,
        producer: &Producer,
        out: PipeWriter,
        quota: u64,
    ) -> Result<(), EngineError>;

    /// Tell the producer its transfer exceeded the quota so it can abort
    /// internally.
    async fn quota_exceeded(&self, producer: &Producer, bytes: u64, quota: u64);

    /// Tear down the producer's agent. Called on every failure path and
    /// from cancellation handlers, so it must be prompt: signal the agent
    /// and return, without waiting for it to die.
    async fn tear_down(&self, producer: &Producer);

    /// Release the producer's agent after its slot completes. Called once
    /// per producer regardless of outcome.
    async fn unbind(&self, producer: &Producer);
}
