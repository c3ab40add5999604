//! Event types for the notification system

use std::time::SystemTime;

use crate::transport::{BackupOutcome, RunStatus};

/// Lifecycle moments of a whole backup run
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunEventType {
    Started,
    Finished,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RunEvent {
    pub event_type: RunEventType,
    /// Terminal status; only present on `Finished`.
    pub status: Option<RunStatus>,
    pub timestamp: SystemTime,
}

impl RunEvent {
    pub fn started() -> Self {
        Self {
            event_type: RunEventType::Started,
            status: None,
            timestamp: SystemTime::now(),
        }
    }

    pub fn finished(status: RunStatus) -> Self {
        Self {
            event_type: RunEventType::Finished,
            status: Some(status),
            timestamp: SystemTime::now(),
        }
    }
}

/// Terminal verdict for one producer's slot
#[derive(Clone, Debug, PartialEq)]
pub struct PackageEvent {
    pub producer: String,
    pub outcome: BackupOutcome,
    pub timestamp: SystemTime,
}

impl PackageEvent {
    pub fn new(producer: impl Into<String>, outcome: BackupOutcome) -> Self {
        Self {
            producer: producer.into(),
            outcome,
            timestamp: SystemTime::now(),
        }
    }
}

/// Mid-stream progress for the producer currently transferring
#[derive(Clone, Debug, PartialEq)]
pub struct ProgressEvent {
    pub producer: String,
    /// Preflight estimate for the whole transfer.
    pub expected_bytes: u64,
    pub sent_bytes: u64,
    pub timestamp: SystemTime,
}

impl ProgressEvent {
    pub fn new(producer: impl Into<String>, expected_bytes: u64, sent_bytes: u64) -> Self {
        Self {
            producer: producer.into(),
            expected_bytes,
            sent_bytes,
            timestamp: SystemTime::now(),
        }
    }
}

/// All events published by the backup engine
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Run(RunEvent),
    Package(PackageEvent),
    Progress(ProgressEvent),
}

impl Event {
    /// Short label for logs and error payloads
    pub fn kind_label(&self) -> &'static str {
        match self {
            Event::Run(_) => "run",
            Event::Package(_) => "package",
            Event::Progress(_) => "progress",
        }
    }
}

/// Subscriber-side event selection
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum EventFilter {
    #[default]
    All,
    RunOnly,
    PackageOnly,
    ProgressOnly,
}

impl EventFilter {
    pub fn accepts(&self, event: &Event) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::RunOnly => matches!(event, Event::Run(_)),
            EventFilter::PackageOnly => matches!(event, Event::Package(_)),
            EventFilter::ProgressOnly => matches!(event, Event::Progress(_)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_all_accepts_everything() {
        let filter = EventFilter::All;
        assert!(filter.accepts(&Event::Run(RunEvent::started())));
        assert!(filter.accepts(&Event::Package(PackageEvent::new("a", BackupOutcome::Success))));
        assert!(filter.accepts(&Event::Progress(ProgressEvent::new("a", 10, 5))));
    }

    #[test]
    fn test_filter_package_only() {
        let filter = EventFilter::PackageOnly;
        assert!(!filter.accepts(&Event::Run(RunEvent::started())));
        assert!(filter.accepts(&Event::Package(PackageEvent::new("a", BackupOutcome::Cancelled))));
        assert!(!filter.accepts(&Event::Progress(ProgressEvent::new("a", 10, 5))));
    }

    #[test]
    fn test_run_event_constructors() {
        let started = RunEvent::started();
        assert_eq!(started.event_type, RunEventType::Started);
        assert_eq!(started.status, None);

        let finished = RunEvent::finished(RunStatus::Success);
        assert_eq!(finished.event_type, RunEventType::Finished);
        assert_eq!(finished.status, Some(RunStatus::Success));
    }
}
