//! Token-keyed registry of cancelable operations

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Opaque handle identifying one cancelable/timeoutable unit of work
pub type OpToken = u64;

/// What kind of work an operation entry guards
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    /// A whole backup run (the orchestrator's own entry)
    Run,
    /// An ephemeral cancelable wait (preflight measurement, runner join)
    Wait,
}

/// Callback surface for tasks that own a registered operation
///
/// `handle_cancel` must only flip flags and release latches; it is invoked
/// from the cancelling task and anything slow here stalls cancellation for
/// the whole process.
#[async_trait]
pub trait BackupTask: Send + Sync {
    /// Deliver the asynchronous result of the operation (for operations that
    /// complete via callback, e.g. a preflight measurement). Non-negative
    /// values are payload, negative values are failure signals.
    async fn operation_complete(&self, result: i64);

    /// Cooperatively cancel the operation. `cancel_all` distinguishes a
    /// whole-run cancellation from a single-operation backstop timeout.
    async fn handle_cancel(&self, cancel_all: bool);
}

struct OpEntry {
    task: Arc<dyn BackupTask>,
    #[allow(dead_code)]
    kind: OpKind,
    cancelled: bool,
}

/// Registry of in-flight cancelable operations
///
/// Injected (as `Arc<OpRegistry>`) into every component that needs to
/// register or cancel waits; independently synchronized from the
/// orchestrator's cancel lock. The internal mutex is never held across an
/// await: lookups clone the task handle out and dispatch after unlocking.
pub struct OpRegistry {
    ops: Mutex<HashMap<OpToken, OpEntry>>,
    next_token: AtomicU64,
}

impl OpRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            ops: Mutex::new(HashMap::new()),
            // Token zero is reserved as "never a real operation"
            next_token: AtomicU64::new(1),
        })
    }

    /// Register a task and return its fresh token.
    ///
    /// Registration must happen before the wait the token guards begins.
    pub fn register(&self, task: Arc<dyn BackupTask>, kind: OpKind) -> OpToken {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let mut ops = self.lock_ops();
        ops.insert(
            token,
            OpEntry {
                task,
                kind,
                cancelled: false,
            },
        );
        log::trace!("registered op token={:#x} kind={:?}", token, kind);
        token
    }

    /// Register a task with a backstop timer.
    ///
    /// If the operation is still registered when `backstop` elapses, it is
    /// cancelled with `cancel_all = false`. Unregistering (or completing)
    /// the operation disarms the timer.
    pub fn register_with_timeout(
        self: &Arc<Self>,
        task: Arc<dyn BackupTask>,
        kind: OpKind,
        backstop: Duration,
    ) -> OpToken {
        let token = self.register(task, kind);
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(backstop).await;
            if registry.is_registered(token) {
                log::debug!("op token={:#x} backstop elapsed; cancelling", token);
                registry.cancel(token, false).await;
            }
        });
        token
    }

    /// Dispatch a cooperative cancel to the operation's owning task.
    ///
    /// Idempotent per token: a second cancel, or a cancel after completion
    /// or unregistration, is a no-op.
    pub async fn cancel(&self, token: OpToken, cancel_all: bool) {
        let task = {
            let mut ops = self.lock_ops();
            match ops.get_mut(&token) {
                Some(entry) if !entry.cancelled => {
                    entry.cancelled = true;
                    Some(Arc::clone(&entry.task))
                }
                Some(_) => {
                    log::debug!("ignoring duplicate cancel for op token={:#x}", token);
                    None
                }
                None => {
                    log::debug!("cancel for unknown/completed op token={:#x}", token);
                    None
                }
            }
        };

        if let Some(task) = task {
            task.handle_cancel(cancel_all).await;
        }
    }

    /// Route an engine-reported result to the operation's owning task.
    ///
    /// Unknown tokens are ignored: the operation may already have been
    /// cancelled and removed by the time a slow engine reports.
    pub async fn complete(&self, token: OpToken, result: i64) {
        let task = {
            let ops = self.lock_ops();
            ops.get(&token).map(|entry| Arc::clone(&entry.task))
        };

        match task {
            Some(task) => task.operation_complete(result).await,
            None => log::debug!("completion for unknown op token={:#x}", token),
        }
    }

    /// Remove the operation. Idempotent.
    pub fn unregister(&self, token: OpToken) {
        let removed = self.lock_ops().remove(&token).is_some();
        if removed {
            log::trace!("unregistered op token={:#x}", token);
        }
    }

    pub fn is_registered(&self, token: OpToken) -> bool {
        self.lock_ops().contains_key(&token)
    }

    pub fn live_op_count(&self) -> usize {
        self.lock_ops().len()
    }

    fn lock_ops(&self) -> std::sync::MutexGuard<'_, HashMap<OpToken, OpEntry>> {
        // Entries stay structurally valid across a panic; recover the guard.
        self.ops.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Completion handle passed into producer engines for callback-style results
///
/// Cloneable and detached from the registering component: whoever ends up
/// holding it (the engine's agent, a spawned measurement task) can deliver
/// the result without seeing the registry or the waiting task.
#[derive(Clone)]
pub struct OpCompletion {
    registry: Arc<OpRegistry>,
    token: OpToken,
}

impl OpCompletion {
    pub fn new(registry: Arc<OpRegistry>, token: OpToken) -> Self {
        Self { registry, token }
    }

    pub fn token(&self) -> OpToken {
        self.token
    }

    /// Deliver the operation's result to whoever is waiting on it.
    pub async fn complete(&self, result: i64) {
        self.registry.complete(self.token, result).await;
    }
}
