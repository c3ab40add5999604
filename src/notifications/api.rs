//! Public API for the notification system
//!
//! This module provides the complete public API for the notification system.
//! External modules should import from here rather than directly from
//! internal modules.

// Core event types and enums
pub use crate::notifications::event::{
    Event, EventFilter, PackageEvent, ProgressEvent, RunEvent, RunEventType,
};

// Manager and utilities
pub use crate::notifications::error::NotificationError;
pub use crate::notifications::manager::AsyncNotificationManager;

// Statistics
pub use crate::notifications::traits::SubscriberStatistics;
