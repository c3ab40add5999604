//! Producer Runner Component
//!
//! One [`ProducerRunner`] drives one producer's backup attempt on its own
//! worker task: the preflight size estimation first, then (only on a clean
//! preflight) the real transfer. The orchestrator joins the attempt through
//! two bounded accessors:
//!
//! - [`ProducerRunner::wait_preflight_result`] returns as soon as the
//!   preflight phase concludes, with the expected byte count or a failure
//!   code;
//! - [`ProducerRunner::wait_final_result`] returns once the whole attempt
//!   concludes.
//!
//! Both accessors are bounded by configurable backstop timeouts and are
//! guaranteed to return a defined value if the runner is cancelled: a
//! cancellation releases every outstanding latch with a `Cancelled`
//! outcome. Internal engine failures never escape the worker; they are
//! classified as producer-agent errors and finalized through the same
//! single path as a normal completion.

mod preflight;
mod runner;

pub(crate) use preflight::RESULT_AGENT_ERROR;
pub use preflight::PreflightEstimator;
pub use runner::{BackupTimeouts, ProducerRunner};
