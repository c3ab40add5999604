//! Pipe Relay Component
//!
//! The byte-moving heart of a transfer: an in-memory pipe abstraction with
//! back-pressure and clean half-close semantics, and the chunked pump that
//! bridges a producer's output pipe to the transport's input pipe.
//!
//! # Overview
//!
//! - **Pipes** ([`pipe`], [`PipePair`]): unidirectional bounded byte
//!   channels built on `tokio::io::simplex`. The writer blocks when the
//!   buffer is full (back-pressure); dropping the writer yields EOF at the
//!   reader exactly once. `PipePair` holds both ends behind `Option`s so
//!   every close path is idempotent.
//! - **Pump** ([`RelayPump`]): reads bounded chunks from the producer-side
//!   pipe, writes them downstream, and notifies the transport chunk by
//!   chunk under the shared cancel lock, enforcing the quota mid-stream.
//! - **Cancel gate** ([`CancelGate`]): the single mutex shared between the
//!   cancel entry point and the pump. The data-and-notify pair for each
//!   chunk is atomic with respect to the cancel flag: either both happen,
//!   or cancellation already tore down the transport link and neither is
//!   attempted.

mod pipe;
mod pump;

pub use pipe::{pipe, PipePair, PipeReader, PipeWriter, DEFAULT_PIPE_CAPACITY};
pub use pump::{CancelFlags, CancelGate, PumpOutcome, RelayPump};
