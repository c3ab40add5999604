//! Status vocabulary for transports, producers, and whole runs

use std::fmt;

/// Answer from a transport call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportStatus {
    /// Proceed.
    Ok,
    /// The transport declines this specific producer.
    PackageRejected,
    /// The producer's data does not fit the storage quota.
    QuotaExceeded,
    /// Transport-level failure not attributable to one producer.
    TransportError,
}

impl TransportStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, TransportStatus::Ok)
    }
}

impl fmt::Display for TransportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TransportStatus::Ok => "ok",
            TransportStatus::PackageRejected => "package-rejected",
            TransportStatus::QuotaExceeded => "quota-exceeded",
            TransportStatus::TransportError => "transport-error",
        };
        write!(f, "{}", label)
    }
}

/// Final verdict for one producer's backup attempt
///
/// Exactly one of these is reported per producer per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupOutcome {
    Success,
    /// Producer-side failure, including unexpected engine errors and
    /// backstop timeouts.
    AgentError,
    /// Quota exceeded at preflight or mid-stream.
    QuotaExceeded,
    /// The transport declined this producer.
    PackageRejected,
    /// Cooperative cancellation observed.
    Cancelled,
    /// Transport-level failure; aborts the remaining queue.
    TransportAborted,
}

impl BackupOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, BackupOutcome::Success)
    }
}

impl From<TransportStatus> for BackupOutcome {
    fn from(status: TransportStatus) -> Self {
        match status {
            TransportStatus::Ok => BackupOutcome::Success,
            TransportStatus::PackageRejected => BackupOutcome::PackageRejected,
            TransportStatus::QuotaExceeded => BackupOutcome::QuotaExceeded,
            TransportStatus::TransportError => BackupOutcome::TransportAborted,
        }
    }
}

impl fmt::Display for BackupOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BackupOutcome::Success => "success",
            BackupOutcome::AgentError => "agent-error",
            BackupOutcome::QuotaExceeded => "quota-exceeded",
            BackupOutcome::PackageRejected => "package-rejected",
            BackupOutcome::Cancelled => "cancelled",
            BackupOutcome::TransportAborted => "transport-aborted",
        };
        write!(f, "{}", label)
    }
}

/// Overall verdict for one whole backup run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    Cancelled,
    TransportAborted,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RunStatus::Success => "success",
            RunStatus::Cancelled => "cancelled",
            RunStatus::TransportAborted => "transport-aborted",
        };
        write!(f, "{}", label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_status_maps_into_outcome() {
        assert_eq!(
            BackupOutcome::from(TransportStatus::Ok),
            BackupOutcome::Success
        );
        assert_eq!(
            BackupOutcome::from(TransportStatus::PackageRejected),
            BackupOutcome::PackageRejected
        );
        assert_eq!(
            BackupOutcome::from(TransportStatus::QuotaExceeded),
            BackupOutcome::QuotaExceeded
        );
        assert_eq!(
            BackupOutcome::from(TransportStatus::TransportError),
            BackupOutcome::TransportAborted
        );
    }

    #[test]
    fn test_display_labels_are_stable() {
        // These labels appear in logs and the CLI summary
        assert_eq!(BackupOutcome::QuotaExceeded.to_string(), "quota-exceeded");
        assert_eq!(RunStatus::TransportAborted.to_string(), "transport-aborted");
        assert_eq!(TransportStatus::Ok.to_string(), "ok");
    }
}
