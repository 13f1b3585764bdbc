//! Monotonic time and cancellable timed waits.
//!
//! Every blocking wait in this crate (ack/con windows, heartbeat intervals,
//! FT1.2 exchange timeouts, TP-UART state polling) goes through a
//! [`Deadline`] so that a single `Condvar` notification can both deliver a
//! result and wake a waiter early, and so tests can reason about elapsed
//! time without a real `sleep`.

use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// A point in time to wait until, backed by a `Condvar` so a waiter can be
/// woken early by whoever holds the paired [`Signal`].
#[derive(Debug)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    #[must_use]
    pub fn after(duration: Duration) -> Self {
        Self {
            at: Instant::now() + duration,
        }
    }

    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    #[must_use]
    pub fn elapsed(&self) -> bool {
        Instant::now() >= self.at
    }
}

/// What woke a [`Signal::wait_until`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// `notify` was called before the deadline elapsed.
    Notified,
    /// The deadline elapsed with no notification.
    TimedOut,
}

/// A condition variable paired with a boolean flag, used to implement
/// cancellable timed waits (ack/con windows, heartbeat retries).
///
/// This is the seam every FSM in this crate blocks on; a test harness can
/// substitute its own `Signal` usage pattern (e.g. notify immediately) to
/// drive state transitions without real delays.
#[derive(Debug)]
pub struct Signal {
    ready: Mutex<bool>,
    cv: Condvar,
}

impl Default for Signal {
    fn default() -> Self {
        Self::new()
    }
}

impl Signal {
    #[must_use]
    pub fn new() -> Self {
        Self {
            ready: Mutex::new(false),
            cv: Condvar::new(),
        }
    }

    /// Wake exactly one waiter (or the next one to arrive).
    pub fn notify(&self) {
        let mut ready = self.ready.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *ready = true;
        self.cv.notify_all();
    }

    /// Block until notified or `deadline` elapses, whichever comes first.
    #[must_use]
    pub fn wait_until(&self, deadline: &Deadline) -> WaitOutcome {
        let mut ready = self.ready.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        loop {
            if *ready {
                *ready = false;
                return WaitOutcome::Notified;
            }
            let remaining = deadline.remaining();
            if remaining.is_zero() {
                return WaitOutcome::TimedOut;
            }
            let (guard, timeout_result) = self
                .cv
                .wait_timeout(ready, remaining)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            ready = guard;
            if timeout_result.timed_out() && !*ready {
                return WaitOutcome::TimedOut;
            }
        }
    }

    /// Reset any pending notification without waiting.
    pub fn clear(&self) {
        let mut ready = self.ready.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *ready = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn times_out_with_no_notification() {
        let signal = Signal::new();
        let deadline = Deadline::after(Duration::from_millis(20));
        assert_eq!(signal.wait_until(&deadline), WaitOutcome::TimedOut);
    }

    #[test]
    fn wakes_on_notify_before_deadline() {
        let signal = Arc::new(Signal::new());
        let signal2 = Arc::clone(&signal);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            signal2.notify();
        });
        let deadline = Deadline::after(Duration::from_secs(2));
        assert_eq!(signal.wait_until(&deadline), WaitOutcome::Notified);
        handle.join().unwrap();
    }

    #[test]
    fn deadline_elapsed_reports_correctly() {
        let d = Deadline::after(Duration::from_millis(1));
        thread::sleep(Duration::from_millis(5));
        assert!(d.elapsed());
    }
}
