//! Queue Orchestrator Component
//!
//! The top-level control loop of the backup engine. A [`BackupOrchestrator`]
//! consumes an ordered queue of producers one at a time: for each it opens a
//! fresh pipe pair, offers the transfer to the transport, spawns a
//! [`ProducerRunner`](crate::runner::ProducerRunner) for the preflight and
//! streaming work, and drives the relay pump on its own task. It then
//! combines the runner's verdict with the transport-side status (transport
//! failures take precedence), commits or aborts the transfer, reports the
//! outcome, and moves on.
//!
//! ## Failure and cancellation policy
//!
//! - Per-producer failures (agent error, quota exceeded, rejection,
//!   cancellation) tear down that producer's slot and the loop continues.
//! - A transport-level failure aborts the remaining queue; the run ends with
//!   [`RunStatus::TransportAborted`](crate::transport::RunStatus).
//! - `handle_cancel(true)` cancels the whole run: the in-flight runner is
//!   cancelled through its registry token and the transport is told to abort
//!   the current transfer. Once it returns, this task issues no further
//!   transport calls. Idempotent.
//!
//! Cleanup — closing both pipe pairs, releasing the exclusivity guard,
//! publishing the run-finished event — happens exactly once on every exit
//! path; the advisory backoff hint is handed to the scheduler unless the
//! run was cancelled.

mod config;
mod error;
mod task;
mod traits;

pub use config::BackupConfig;
pub use error::OrchestratorError;
pub use task::BackupOrchestrator;
pub use traits::{NoopLifecycle, NoopScheduler, RunLifecycle, RunScheduler};
