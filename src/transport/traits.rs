//! The transport trait driven by the orchestrator and relay pump

use async_trait::async_trait;
use std::time::Duration;

use crate::producer::Producer;
use crate::relay::PipeReader;
use crate::transport::TransportStatus;

/// Flags describing how a transfer was initiated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferFlags {
    /// The run was started explicitly by the user rather than by a schedule.
    pub user_initiated: bool,
}

impl TransferFlags {
    pub fn user_initiated(value: bool) -> Self {
        Self {
            user_initiated: value,
        }
    }
}

/// Remote storage backend receiving streamed backups
///
/// All calls are awaited in place by the orchestrator or pump and may block
/// on network I/O internally. Implementations must be safe to call from the
/// orchestrator task and the cancel entry point concurrently
/// (`cancel_full_backup` can race the rest of the surface).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Start a full transfer for `producer`. The transport takes ownership
    /// of the read end of the transport-side pipe and is expected to drain
    /// it for the duration of the transfer. A non-OK answer rejects the
    /// producer before any data moves.
    async fn begin_full_backup(
        &self,
        producer: &Producer,
        data: PipeReader,
        flags: TransferFlags,
    ) -> TransportStatus;

    /// Byte ceiling for this producer's transfer. Constant for the duration
    /// of the transfer.
    async fn get_quota(&self, producer: &Producer) -> u64;

    /// Validate a preflight size estimate against real-world constraints.
    async fn check_full_data_size(&self, bytes: u64) -> TransportStatus;

    /// Announce that `bytes` more bytes are on the pipe. Called once per
    /// relayed chunk; a non-OK answer stops the transfer.
    async fn send_chunk_notify(&self, bytes: u64) -> TransportStatus;

    /// Commit the current producer's transfer.
    async fn finish_backup(&self) -> TransportStatus;

    /// Abort the current producer's transfer. Must tolerate being called
    /// when no transfer is active.
    async fn cancel_full_backup(&self);

    /// Advisory delay before the next run should start. Bookkeeping only;
    /// not enforced by this engine.
    async fn request_next_delay(&self) -> Duration;
}
