//! Orchestrator error types

/// Failures surfaced by the orchestrator's own API
///
/// Runtime trouble inside the loop never lands here: per-producer failures
/// are absorbed into outcomes and transport-level failures end the run with
/// a `TransportAborted` status, so `run()` only errors on misuse.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrchestratorError {
    #[error("backup run already started; run() is single-shot per task")]
    AlreadyStarted,
}

impl crate::core::error_handling::ContextualError for OrchestratorError {
    fn is_user_actionable(&self) -> bool {
        false
    }

    fn user_message(&self) -> Option<&str> {
        None
    }
}
