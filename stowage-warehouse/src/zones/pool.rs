//! Bounded resource pool with timed acquisition.

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};
use tracing::trace;

/// Counting gate modelling a fixed set of terminals.
///
/// `acquire` waits up to a timeout for a permit; `release` returns one,
/// clamped to the pool capacity so a double release cannot mint permits.
#[derive(Debug)]
pub struct TimedPool {
    name: &'static str,
    capacity: u32,
    available: Mutex<u32>,
    cv: Condvar,
}

impl TimedPool {
    /// Create a pool with `capacity` permits, all initially available.
    #[must_use]
    pub fn new(capacity: u32, name: &'static str) -> Self {
        Self { name, capacity, available: Mutex::new(capacity), cv: Condvar::new() }
    }

    /// Pool capacity.
    #[must_use]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Wait up to `timeout` for a permit; returns whether one was taken.
    pub fn acquire(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut available = self.available.lock();
        while *available == 0 {
            if self.cv.wait_until(&mut available, deadline).timed_out() {
                if *available == 0 {
                    trace!(pool = self.name, "permit wait timed out");
                    return false;
                }
                break;
            }
        }
        *available -= 1;
        true
    }

    /// Return a permit and wake one waiter.
    pub fn release(&self) {
        {
            let mut available = self.available.lock();
            *available = (*available + 1).min(self.capacity);
        }
        self.cv.notify_one();
    }
}
