//! Network-wide count of outstanding asynchronous work.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct Inner {
    count: AtomicUsize,
    lock: Mutex<()>,
    idle: Condvar,
}

/// Counts in-flight work (undelivered sends, running deliveries, scheduled
/// node tasks) across a whole mock network.
///
/// The count is atomic; waiters are woken through a condition variable when
/// it drains to zero. Clones share the same counter.
#[derive(Debug, Clone, Default)]
pub struct BusyCounter {
    inner: Arc<Inner>,
}

impl BusyCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one more unit of outstanding work.
    pub fn increment(&self) {
        self.increment_by(1);
    }

    pub fn increment_by(&self, units: usize) {
        self.inner.count.fetch_add(units, Ordering::AcqRel);
    }

    /// Record that one unit of work finished.
    ///
    /// Decrementing an idle counter is a no-op.
    pub fn decrement(&self) {
        self.decrement_by(1);
    }

    /// Record that `units` of work finished, saturating at zero.
    pub fn decrement_by(&self, units: usize) {
        if units == 0 {
            return;
        }
        let previous = self
            .inner
            .count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n > 0).then(|| n.saturating_sub(units))
            });
        if matches!(previous, Ok(n) if n <= units) {
            let _guard = self.inner.lock.lock();
            self.inner.idle.notify_all();
        }
    }

    /// Record one unit of work that finishes when the returned token drops.
    pub fn track(&self) -> BusyToken {
        self.increment();
        BusyToken {
            counter: self.clone(),
        }
    }

    /// Current amount of outstanding work.
    pub fn count(&self) -> usize {
        self.inner.count.load(Ordering::Acquire)
    }

    /// Whether nothing is outstanding.
    pub fn is_idle(&self) -> bool {
        self.count() == 0
    }

    /// Block until the count reaches zero.
    pub fn wait_idle(&self) {
        let mut guard = self.inner.lock.lock();
        while !self.is_idle() {
            self.inner.idle.wait(&mut guard);
        }
    }

    /// Block until the count reaches zero or `timeout` elapses.
    ///
    /// Returns true if the counter drained.
    pub fn wait_idle_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut guard = self.inner.lock.lock();
        while !self.is_idle() {
            if self.inner.idle.wait_until(&mut guard, deadline).timed_out() {
                return self.is_idle();
            }
        }
        true
    }
}

/// One unit of outstanding work; decrements its counter on drop.
#[derive(Debug)]
#[must_use = "dropping the token immediately ends the tracked work"]
pub struct BusyToken {
    counter: BusyCounter,
}

impl Drop for BusyToken {
    fn drop(&mut self) {
        self.counter.decrement();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_counts_up_and_down() {
        let busy = BusyCounter::new();
        busy.increment();
        busy.increment();
        assert_eq!(busy.count(), 2);
        busy.decrement();
        busy.decrement();
        assert!(busy.is_idle());
        busy.decrement();
        assert_eq!(busy.count(), 0);
    }

    #[test]
    fn test_bulk_adjustments_saturate() {
        let busy = BusyCounter::new();
        busy.increment_by(3);
        busy.decrement_by(2);
        assert_eq!(busy.count(), 1);
        busy.decrement_by(5);
        assert!(busy.is_idle());
        busy.decrement_by(0);
        assert!(busy.is_idle());
    }

    #[test]
    fn test_wait_idle_wakes_when_drained() {
        let busy = BusyCounter::new();
        busy.increment();
        let worker = busy.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            worker.decrement();
        });
        busy.wait_idle();
        assert!(busy.is_idle());
        handle.join().unwrap();
    }

    #[test]
    fn test_token_releases_on_drop() {
        let busy = BusyCounter::new();
        let token = busy.track();
        assert_eq!(busy.count(), 1);
        drop(token);
        assert!(busy.is_idle());
    }

    #[test]
    fn test_wait_idle_timeout_reports_busy() {
        let busy = BusyCounter::new();
        busy.increment();
        assert!(!busy.wait_idle_timeout(Duration::from_millis(10)));
        busy.decrement();
        assert!(busy.wait_idle_timeout(Duration::from_millis(10)));
    }
}
