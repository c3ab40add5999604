//! Operation Registry Component
//!
//! A token-keyed table of in-flight cancelable operations. Every blocking
//! wait in the backup engine that can be cancelled from another task holds a
//! live entry here for its duration, so that any holder of the token can
//! dispatch a cooperative cancel (or a backstop-timeout cancel) to the
//! owning task without racing its completion.
//!
//! # Overview
//!
//! - **Registration before waiting**: a task registers itself (obtaining a
//!   fresh opaque token) before it starts the wait the token guards, so a
//!   cancel can never arrive for a wait that is about to exist.
//! - **Backstop timers**: `register_with_timeout` arms a timer that cancels
//!   the operation if it is still live when the backstop elapses; timer
//!   cancels are delivered with `cancel_all = false` so handlers can tell a
//!   timeout apart from a whole-run cancellation.
//! - **Completion routing**: producer engines report measurement results
//!   through `OpCompletion::complete`, which dispatches to the registered
//!   task's `operation_complete` callback.
//! - **Idempotence**: cancelling an already-cancelled or already-removed
//!   operation is a no-op, and `unregister` may be called repeatedly.
//!
//! Cancellation handlers must return promptly: they only flip flags and
//! release latches, never perform blocking I/O.

mod registry;

pub use registry::{BackupTask, OpCompletion, OpKind, OpRegistry, OpToken};
