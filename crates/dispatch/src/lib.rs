//! Execution resources for mock nodes.
//!
//! Node processing never runs on the caller's thread directly. Each started
//! node dispatches its work through a [`NodeDispatch`]:
//!
//! - **Shared**: one [`SharedWorker`] serializes every node of a network,
//!   which keeps pumped runs deterministic
//! - **Dedicated**: a private [`Worker`] per node, used in thread-per-node mode

mod shared;
mod worker;

pub use shared::SharedWorker;
pub use worker::Worker;

use std::sync::Arc;
use std::time::Duration;

/// Errors from submitting work to a worker.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkerError {
    #[error("worker {0} is shut down")]
    ShutDown(String),

    #[error("job on worker {0} did not complete")]
    JobFailed(String),

    #[error("failed to spawn worker thread: {0}")]
    Spawn(String),
}

/// The executor a started node runs its processing on.
#[derive(Debug, Clone)]
pub enum NodeDispatch {
    Shared(Arc<SharedWorker>),
    Dedicated(Arc<Worker>),
}

impl NodeDispatch {
    /// Join the shared worker as one more holder.
    pub fn shared(worker: &Arc<SharedWorker>) -> Result<Self, WorkerError> {
        worker.acquire()?;
        Ok(Self::Shared(Arc::clone(worker)))
    }

    /// Spawn a private worker.
    pub fn dedicated(name: impl Into<String>) -> Result<Self, WorkerError> {
        Ok(Self::Dedicated(Arc::new(Worker::spawn(name)?)))
    }

    fn worker(&self) -> &Worker {
        match self {
            Self::Shared(shared) => shared.worker(),
            Self::Dedicated(worker) => worker,
        }
    }

    pub fn is_shared(&self) -> bool {
        matches!(self, Self::Shared(_))
    }

    pub fn execute(&self, job: impl FnOnce() + Send + 'static) -> Result<(), WorkerError> {
        self.worker().execute(job)
    }

    pub fn run<F, R>(&self, f: F) -> Result<R, WorkerError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.worker().run(f)
    }

    pub fn flush(&self) -> Result<(), WorkerError> {
        self.worker().flush()
    }

    /// Give the executor back: release the shared worker or shut the private
    /// one down.
    pub fn shutdown(&self) {
        match self {
            Self::Shared(shared) => {
                shared.release();
            }
            Self::Dedicated(worker) => {
                worker.shutdown();
            }
        }
    }

    pub fn await_termination(&self, timeout: Duration) -> bool {
        match self {
            Self::Shared(shared) => shared.await_termination(timeout),
            Self::Dedicated(worker) => worker.await_termination(timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_dispatch_holds_reference() {
        let worker = Arc::new(SharedWorker::spawn("net-worker").unwrap());
        let a = NodeDispatch::shared(&worker).unwrap();
        let b = NodeDispatch::shared(&worker).unwrap();
        assert_eq!(worker.holders(), 2);
        assert!(a.is_shared());

        a.shutdown();
        assert_eq!(b.run(|| 5).unwrap(), 5);
        b.shutdown();
        assert_eq!(worker.teardown_count(), 1);
        assert!(b.execute(|| {}).is_err());
    }

    #[test]
    fn test_dedicated_dispatch_shuts_down_own_worker() {
        let dispatch = NodeDispatch::dedicated("node-0").unwrap();
        assert!(!dispatch.is_shared());
        dispatch.flush().unwrap();
        dispatch.shutdown();
        assert!(dispatch.await_termination(Duration::from_secs(5)));
    }
}
