//! Shared replay progress
//!
//! One writer (the running sequence) and any number of pollers. A single
//! mutex covers both fields, so a poller never sees the flag and the buffer
//! out of step, and draining is one atomic take.

use crate::core::types::Response;
use parking_lot::Mutex;
use serde::Serialize;

/// Result of one poll
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReplayPoll {
    /// `true` when no replay is running
    pub done: bool,
    /// Messages recorded since the previous poll
    pub messages: Vec<Response>,
}

#[derive(Default)]
struct StatusInner {
    running: bool,
    messages: Vec<Response>,
}

/// Running flag plus drainable message buffer
#[derive(Default)]
pub struct ReplayStatus {
    inner: Mutex<StatusInner>,
}

impl ReplayStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter `Running` with an empty buffer if idle. Returns `false` if a
    /// run is active.
    pub(crate) fn try_begin(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.running {
            return false;
        }
        inner.running = true;
        inner.messages.clear();
        true
    }

    pub(crate) fn push(&self, message: Response) {
        self.inner.lock().messages.push(message);
    }

    /// Back to `Idle`
    pub(crate) fn finish(&self) {
        self.inner.lock().running = false;
    }

    /// Drain the buffer and report whether the run is over
    pub fn poll(&self) -> ReplayPoll {
        let mut inner = self.inner.lock();
        ReplayPoll {
            done: !inner.running,
            messages: std::mem::take(&mut inner.messages),
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock().running
    }

    /// Messages waiting to be polled
    pub fn pending(&self) -> usize {
        self.inner.lock().messages.len()
    }
}
