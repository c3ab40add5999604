//! Transport Component
//!
//! The seam between the backup engine and the remote storage backend. The
//! orchestrator and relay pump drive a [`Transport`] implementation through
//! a small synchronous-looking call surface (every call is awaited in place
//! and may block on network I/O internally): begin a transfer, fetch the
//! quota, acknowledge data chunk by chunk, then commit or abort.
//!
//! This module also owns the status vocabulary shared across the engine:
//! [`TransportStatus`] for answers from the transport, [`BackupOutcome`] for
//! the per-producer verdict, and [`RunStatus`] for the whole run.

mod status;
mod traits;

pub use status::{BackupOutcome, RunStatus, TransportStatus};
pub use traits::{TransferFlags, Transport};
