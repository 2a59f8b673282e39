//! One-shot readiness signals.
//!
//! A [`Readiness`] is completed once, either successfully or with a failure,
//! and any number of threads can block until that happens. Nodes use it for
//! network-map registration and replicas for their own initialization.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Failure carried by a readiness signal, or a wait that gave up.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReadinessError {
    /// The signal was completed with a failure.
    #[error("{0}")]
    Failed(String),

    /// The signal did not complete within the wait timeout.
    #[error("timed out after {0:?}")]
    TimedOut(Duration),
}

#[derive(Debug, Default)]
struct State {
    outcome: Mutex<Option<Result<(), String>>>,
    completed: Condvar,
}

/// A cloneable one-shot completion signal.
#[derive(Debug, Clone, Default)]
pub struct Readiness {
    state: Arc<State>,
}

impl Readiness {
    /// Create an incomplete signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Complete successfully. Returns false if the signal was already complete.
    pub fn set(&self) -> bool {
        self.complete(Ok(()))
    }

    /// Complete with a failure. Returns false if the signal was already complete.
    pub fn fail(&self, reason: impl Into<String>) -> bool {
        self.complete(Err(reason.into()))
    }

    fn complete(&self, outcome: Result<(), String>) -> bool {
        let mut slot = self.state.outcome.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(outcome);
        self.state.completed.notify_all();
        true
    }

    /// Whether the signal has completed, successfully or not.
    pub fn is_complete(&self) -> bool {
        self.state.outcome.lock().is_some()
    }

    /// The outcome, if complete.
    pub fn outcome(&self) -> Option<Result<(), ReadinessError>> {
        self.state
            .outcome
            .lock()
            .clone()
            .map(|outcome| outcome.map_err(ReadinessError::Failed))
    }

    /// Block until complete and return the outcome.
    pub fn wait(&self) -> Result<(), ReadinessError> {
        let mut slot = self.state.outcome.lock();
        loop {
            if let Some(outcome) = slot.as_ref() {
                return outcome.clone().map_err(ReadinessError::Failed);
            }
            self.state.completed.wait(&mut slot);
        }
    }

    /// Block until complete or until `timeout` elapses.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<(), ReadinessError> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.state.outcome.lock();
        loop {
            if let Some(outcome) = slot.as_ref() {
                return outcome.clone().map_err(ReadinessError::Failed);
            }
            if self.state.completed.wait_until(&mut slot, deadline).timed_out() {
                return match slot.as_ref() {
                    Some(outcome) => outcome.clone().map_err(ReadinessError::Failed),
                    None => Err(ReadinessError::TimedOut(timeout)),
                };
            }
        }
    }
}
