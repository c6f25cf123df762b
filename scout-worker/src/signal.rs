//! Set/clear event signal
//!
//! A small synchronization primitive shared between the scheduler and the
//! pool: the result-threshold wake and the shutdown request both use it.
//! Setting is sticky until cleared, and waiters observe a set that happens
//! while they sleep.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

/// Cloneable set/clear event
///
/// Clones share the same state, so one side can set while the other waits.
#[derive(Clone, Debug, Default)]
pub struct Signal {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    flag: AtomicBool,
    notify: Notify,
}

impl Signal {
    /// Creates a new, unset signal
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the signal and wake a pending waiter
    pub fn set(&self) {
        self.inner.flag.store(true, Ordering::Release);
        self.inner.notify.notify_one();
    }

    /// Clear the signal
    pub fn clear(&self) {
        self.inner.flag.store(false, Ordering::Release);
    }

    /// Whether the signal is currently set
    pub fn is_set(&self) -> bool {
        self.inner.flag.load(Ordering::Acquire)
    }

    /// Wait until the signal is set or `timeout` elapses
    ///
    /// Returns whether the signal was set. A stale wake permit left over from
    /// an earlier set/clear pair only causes a re-check, never an early
    /// return.
    pub async fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;

        loop {
            if self.is_set() {
                return true;
            }

            let notified = self.inner.notify.notified();
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.is_set();
            }
        }
    }
}
