//! Collaborator seams around a backup run

use async_trait::async_trait;
use std::time::Duration;

/// Scheduling collaborator for runs beyond this one
///
/// Bookkeeping only: the engine records when the next run should happen and
/// which producers were attempted, but enforces neither.
#[async_trait]
pub trait RunScheduler: Send + Sync {
    /// Schedule the next whole run after `delay` (the transport's last
    /// advisory backoff hint). Invoked only on non-cancelled completion.
    async fn schedule_next_run(&self, delay: Duration);

    /// Note that `producer` was attempted this run, whatever the outcome.
    async fn requeue_producer(&self, producer: &str);
}

/// Run-duration resource holder
///
/// Models the exclusivity lock and wake/keep-alive resource a host platform
/// grants a backup pass: at most one run may hold the guard at a time, and
/// it is held for the run's whole duration.
#[async_trait]
pub trait RunLifecycle: Send + Sync {
    /// Try to take the run guard. `false` means another run holds it and
    /// this run must not proceed.
    async fn try_acquire(&self) -> bool;

    /// Release the guard taken by `try_acquire`. Called exactly once per
    /// successful acquire, after all other cleanup.
    async fn release(&self);
}

/// Scheduler that records nothing and schedules nothing
pub struct NoopScheduler;

#[async_trait]
impl RunScheduler for NoopScheduler {
    async fn schedule_next_run(&self, delay: Duration) {
        log::debug!("No scheduler wired; dropping backoff hint {:?}", delay);
    }

    async fn requeue_producer(&self, _producer: &str) {}
}

/// Lifecycle guard that always grants the run
pub struct NoopLifecycle;

#[async_trait]
impl RunLifecycle for NoopLifecycle {
    async fn try_acquire(&self) -> bool {
        true
    }

    async fn release(&self) {}
}
