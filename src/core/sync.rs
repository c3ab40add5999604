//! Synchronization utilities for robust mutex handling
//!
//! This module provides utilities for handling mutex poisoning and the
//! one-shot result latches used to hand results between worker tasks and
//! the orchestrator.

use std::sync::{LockResult, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// Handle poisoned mutex cases with consistent error handling
///
/// This utility function converts mutex poison errors into application-specific
/// errors using a provided error constructor. This ensures consistent error
/// handling across the codebase when mutexes become poisoned due to panics.
///
/// # Arguments
/// * `result` - The result from a mutex lock operation
/// * `error_constructor` - Function to create the appropriate error type
///
/// # Returns
/// The mutex guard on success, or an application error on poison/failure
pub fn handle_mutex_poison<T, E>(
    result: LockResult<T>,
    error_constructor: impl FnOnce(String) -> E,
) -> Result<T, E> {
    result.map_err(|poison_err| {
        error_constructor(
            format!(
                "Internal synchronisation error (mutex poisoned). This indicates a panic occurred while holding a lock. PoisonError: {:?}",
                poison_err
            )
        )
    })
}

/// One-shot, first-set-wins result latch
///
/// A `OnceLatch` carries a single value from whichever of several racing
/// parties gets there first (normal completion, cancellation, or a timeout
/// path) to any number of waiters. The first `set` wins; later calls are
/// no-ops that report `false`. Waiters that arrive after the value is set
/// complete immediately.
///
/// This is the cross-task handoff primitive behind the runner's preflight
/// and final-result join points: each phase owns one latch, satisfied
/// exactly once.
pub struct OnceLatch<T> {
    slot: Mutex<Option<T>>,
    notify: Notify,
}

impl<T: Clone> OnceLatch<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            notify: Notify::new(),
        }
    }

    /// Set the latch value. Returns `true` if this call won the race,
    /// `false` if a value was already present (the new value is discarded).
    pub fn set(&self, value: T) -> bool {
        // A poisoned slot means a setter panicked mid-store; the Option
        // inside is still structurally valid, so recover the guard.
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_some() {
            return false;
        }
        *slot = Some(value);
        drop(slot);
        self.notify.notify_waiters();
        true
    }

    /// Current value, if the latch has been satisfied.
    pub fn get(&self) -> Option<T> {
        self.slot
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Wait until the latch is satisfied.
    pub async fn wait(&self) -> T {
        loop {
            // Register interest before checking the slot so a set() between
            // the check and the await cannot be missed.
            let notified = self.notify.notified();
            if let Some(value) = self.get() {
                return value;
            }
            notified.await;
        }
    }

    /// Wait until the latch is satisfied or the backstop elapses.
    ///
    /// `None` means the backstop won; the latch may still be satisfied
    /// later by its owner.
    pub async fn wait_timeout(&self, backstop: Duration) -> Option<T> {
        tokio::time::timeout(backstop, self.wait()).await.ok()
    }
}

impl<T: Clone> Default for OnceLatch<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[derive(Debug, PartialEq)]
    struct TestError {
        message: String,
    }

    #[test]
    fn test_handle_mutex_poison_success() {
        let mutex = Arc::new(Mutex::new(42));
        let result = handle_mutex_poison(mutex.lock(), |msg| TestError { message: msg });

        assert!(result.is_ok());
        assert_eq!(*result.unwrap(), 42);
    }

    #[test]
    fn test_handle_mutex_poison_with_poisoned_mutex() {
        let mutex = Arc::new(Mutex::new(42));
        let mutex_clone = Arc::clone(&mutex);

        // Poison the mutex by panicking while holding the lock
        let _ = thread::spawn(move || {
            let _guard = mutex_clone.lock().unwrap();
            panic!("Intentional panic to poison mutex");
        })
        .join();

        // Now try to lock the poisoned mutex
        let result = handle_mutex_poison(mutex.lock(), |msg| TestError { message: msg });

        assert!(result.is_err());
        let error = result.unwrap_err();
        assert!(error.message.contains("mutex poisoned"));
        assert!(error.message.contains("panic occurred"));
    }

    #[test]
    fn test_once_latch_first_set_wins() {
        let latch = OnceLatch::new();

        assert!(latch.set(1));
        assert!(!latch.set(2));
        assert_eq!(latch.get(), Some(1));
    }

    #[tokio::test]
    async fn test_once_latch_wait_completes_after_set() {
        let latch = Arc::new(OnceLatch::new());
        let waiter = Arc::clone(&latch);

        let handle = tokio::spawn(async move { waiter.wait().await });

        // Give the waiter a moment to park before satisfying the latch
        tokio::task::yield_now().await;
        latch.set("done");

        assert_eq!(handle.await.unwrap(), "done");
    }

    #[tokio::test]
    async fn test_once_latch_wait_after_set_returns_immediately() {
        let latch = OnceLatch::new();
        latch.set(7u64);

        assert_eq!(latch.wait().await, 7);
    }

    #[tokio::test]
    async fn test_once_latch_wait_timeout_elapses() {
        let latch: OnceLatch<u64> = OnceLatch::new();

        let result = latch.wait_timeout(Duration::from_millis(20)).await;
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_once_latch_many_waiters_all_unblock() {
        let latch = Arc::new(OnceLatch::new());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let latch = Arc::clone(&latch);
                tokio::spawn(async move { latch.wait().await })
            })
            .collect();

        tokio::task::yield_now().await;
        latch.set(99u64);

        for handle in handles {
            assert_eq!(handle.await.unwrap(), 99);
        }
    }
}
