//! A single named worker thread fed by a job channel.

use crate::WorkerError;
use crossbeam::channel::{self, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;
use tracing::{debug, error, trace};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// One OS thread executing submitted jobs in FIFO order.
///
/// Jobs never run concurrently with each other. A panicking job is logged and
/// the worker moves on to the next one.
pub struct Worker {
    name: String,
    sender: Mutex<Option<Sender<Job>>>,
    thread_id: ThreadId,
    /// Disconnects when the worker thread exits.
    exited: channel::Receiver<()>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("name", &self.name)
            .field("shutdown", &self.is_shutdown())
            .finish()
    }
}

impl Worker {
    /// Spawn a worker thread with the given name.
    pub fn spawn(name: impl Into<String>) -> Result<Self, WorkerError> {
        let name = name.into();
        let (job_tx, job_rx) = channel::unbounded::<Job>();
        let (exit_tx, exit_rx) = channel::bounded::<()>(0);

        let thread_name = name.clone();
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let _exit = exit_tx;
                for job in job_rx {
                    if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                        error!(worker = %thread_name, "Job panicked");
                    }
                }
                debug!(worker = %thread_name, "Worker drained and exited");
            })
            .map_err(|e| WorkerError::Spawn(e.to_string()))?;

        debug!(worker = %name, "Spawned worker");

        Ok(Self {
            name,
            sender: Mutex::new(Some(job_tx)),
            thread_id: handle.thread().id(),
            exited: exit_rx,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// The worker's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the calling thread is this worker's thread.
    pub fn is_worker_thread(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    /// Queue a job.
    pub fn execute(&self, job: impl FnOnce() + Send + 'static) -> Result<(), WorkerError> {
        let sender = self.sender.lock();
        match sender.as_ref() {
            Some(tx) => tx
                .send(Box::new(job))
                .map_err(|_| WorkerError::ShutDown(self.name.clone())),
            None => Err(WorkerError::ShutDown(self.name.clone())),
        }
    }

    /// Run a closure on the worker and wait for its result.
    ///
    /// Runs inline when called from the worker thread itself.
    pub fn run<F, R>(&self, f: F) -> Result<R, WorkerError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.is_worker_thread() {
            return Ok(f());
        }
        let (tx, rx) = channel::bounded(1);
        self.execute(move || {
            let _ = tx.send(f());
        })?;
        rx.recv()
            .map_err(|_| WorkerError::JobFailed(self.name.clone()))
    }

    /// Wait until every job queued before this call has run.
    pub fn flush(&self) -> Result<(), WorkerError> {
        self.run(|| ())
    }

    /// Stop accepting jobs. Already queued jobs still run.
    ///
    /// Returns true if this call performed the shutdown.
    pub fn shutdown(&self) -> bool {
        let sender = self.sender.lock().take();
        if sender.is_some() {
            trace!(worker = %self.name, "Worker shut down");
        }
        sender.is_some()
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn is_shutdown(&self) -> bool {
        self.sender.lock().is_none()
    }

    /// Block until the worker thread has exited or `timeout` elapses.
    ///
    /// Only a shut down worker ever exits, so this returns false after the
    /// timeout for a live worker.
    pub fn await_termination(&self, timeout: Duration) -> bool {
        if self.is_worker_thread() {
            return false;
        }
        match self.exited.recv_timeout(timeout) {
            Err(RecvTimeoutError::Disconnected) => {
                if let Some(handle) = self.handle.lock().take() {
                    let _ = handle.join();
                }
                true
            }
            Ok(()) | Err(RecvTimeoutError::Timeout) => false,
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.shutdown();
    }
}
