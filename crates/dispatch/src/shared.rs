//! The reference-counted worker shared by all nodes of a mock network.

use crate::{Worker, WorkerError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, info};

/// Holder count value once the worker has been torn down.
const TORN_DOWN: usize = usize::MAX;

/// One worker serializing the processing of many nodes.
///
/// Every started node holds one reference. [`release`](Self::release) tears
/// the worker down only when the last holder lets go, regardless of the order
/// in which nodes stop. The holder count and the torn-down state live in one
/// atomic so concurrent releases tear down exactly once.
#[derive(Debug)]
pub struct SharedWorker {
    worker: Worker,
    holders: AtomicUsize,
    teardowns: AtomicUsize,
}

impl SharedWorker {
    /// Spawn the underlying worker with no holders.
    pub fn spawn(name: impl Into<String>) -> Result<Self, WorkerError> {
        Ok(Self {
            worker: Worker::spawn(name)?,
            holders: AtomicUsize::new(0),
            teardowns: AtomicUsize::new(0),
        })
    }

    /// Register one more holder. Returns the new holder count.
    ///
    /// A torn down worker is never respawned; acquiring it fails.
    pub fn acquire(&self) -> Result<usize, WorkerError> {
        let previous = self
            .holders
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n != TORN_DOWN).then(|| n + 1)
            })
            .map_err(|_| WorkerError::ShutDown(self.worker.name().to_string()))?;
        debug!(worker = %self.worker.name(), holders = previous + 1, "Acquired shared worker");
        Ok(previous + 1)
    }

    /// Drop one holder, tearing the worker down when it was the last one.
    ///
    /// Releasing with no holders is a no-op. Returns true if this call
    /// performed the teardown.
    pub fn release(&self) -> bool {
        let previous = self
            .holders
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| match n {
                0 | TORN_DOWN => None,
                1 => Some(TORN_DOWN),
                n => Some(n - 1),
            });
        match previous {
            Ok(1) => {
                self.worker.shutdown();
                self.teardowns.fetch_add(1, Ordering::AcqRel);
                info!(
                    worker = %self.worker.name(),
                    "Last holder released, shared worker torn down"
                );
                true
            }
            Ok(n) => {
                debug!(worker = %self.worker.name(), holders = n - 1, "Released shared worker");
                false
            }
            Err(_) => false,
        }
    }

    /// Current number of holders.
    pub fn holders(&self) -> usize {
        match self.holders.load(Ordering::Acquire) {
            TORN_DOWN => 0,
            n => n,
        }
    }

    /// How many times the worker was really torn down.
    pub fn teardown_count(&self) -> usize {
        self.teardowns.load(Ordering::Acquire)
    }

    /// Whether the worker has been torn down.
    pub fn is_shutdown(&self) -> bool {
        self.worker.is_shutdown()
    }

    /// Wait for termination.
    ///
    /// A live worker is not waited on: its queued work is flushed and this
    /// returns true immediately. A torn down worker gets the ordinary
    /// blocking wait.
    pub fn await_termination(&self, timeout: Duration) -> bool {
        if !self.worker.is_shutdown() {
            return self.worker.flush().is_ok() || self.worker.is_shutdown();
        }
        self.worker.await_termination(timeout)
    }

    /// The underlying worker.
    pub fn worker(&self) -> &Worker {
        &self.worker
    }
}
