//! Engine configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::relay::DEFAULT_PIPE_CAPACITY;
use crate::runner::BackupTimeouts;
use crate::transport::TransferFlags;

/// Tunables for one backup run
///
/// Loaded from the `[backup]` table of the TOML config file and overridden
/// by CLI flags; every field has a default so an empty table is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    /// Bytes moved per pump iteration.
    pub chunk_size: usize,
    /// In-flight buffer per pipe leg; the producer blocks once this many
    /// unread bytes are queued.
    pub pipe_capacity: usize,
    /// Backstop for the preflight phase, seconds.
    pub preflight_timeout_secs: u64,
    /// Backstop for joining a finished transfer, seconds.
    pub transfer_timeout_secs: u64,
    /// Whether this run was started explicitly by the user.
    pub user_initiated: bool,
    /// Whether to requeue attempted producers and reschedule the next run.
    pub update_schedule: bool,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            chunk_size: 8192,
            pipe_capacity: DEFAULT_PIPE_CAPACITY,
            preflight_timeout_secs: 300,
            transfer_timeout_secs: 300,
            user_initiated: false,
            update_schedule: true,
        }
    }
}

impl BackupConfig {
    pub fn timeouts(&self) -> BackupTimeouts {
        BackupTimeouts {
            preflight: Duration::from_secs(self.preflight_timeout_secs),
            transfer: Duration::from_secs(self.transfer_timeout_secs),
        }
    }

    pub fn transfer_flags(&self) -> TransferFlags {
        TransferFlags::user_initiated(self.user_initiated)
    }
}
