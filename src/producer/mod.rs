//! Producer Component
//!
//! The data-producing side of a backup: the [`Producer`] identity type, the
//! eligibility-filtered queue construction used before a run starts, and the
//! [`ProducerEngine`] seam through which producers measure and stream their
//! payload.
//!
//! Eligibility is a pure predicate evaluated exactly once while the queue is
//! built; once `run()` starts, the queue is fixed and consumed in order.

mod engine;

pub use engine::{EngineError, ProducerEngine};

/// An entity that generates the bytes to be backed up
///
/// Identified by a stable name; `source` is an opaque locator only its
/// engine understands (a path, a URI, an agent id). Liveness of the backing
/// agent is owned by the engine, not by this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Producer {
    name: String,
    source: String,
}

impl Producer {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

/// Build the ordered backup queue from candidate producers
///
/// Applies the eligibility predicate once per candidate and drops the ones
/// that fail it, preserving order. Culled producers are logged and never
/// reach the orchestrator.
pub fn build_queue<F>(candidates: Vec<Producer>, eligible: F) -> Vec<Producer>
where
    F: Fn(&Producer) -> bool,
{
    let mut queue = Vec::with_capacity(candidates.len());
    for producer in candidates {
        if eligible(&producer) {
            queue.push(producer);
        } else {
            log::debug!("Ignoring ineligible producer {}", producer.name());
        }
    }
    queue
}
