//! Link traffic counters

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated by the worker thread, read lock-free by anyone
#[derive(Default)]
pub(crate) struct LinkCounters {
    pub sent: AtomicU64,
    pub replies: AtomicU64,
    pub timeouts: AtomicU64,
    pub discarded: AtomicU64,
}

impl LinkCounters {
    pub fn snapshot(&self) -> LinkStats {
        LinkStats {
            commands_sent: self.sent.load(Ordering::Relaxed),
            replies_received: self.replies.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            lines_discarded: self.discarded.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the link counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LinkStats {
    /// Commands written to the wire
    pub commands_sent: u64,
    /// Well-formed replies handed back to callers
    pub replies_received: u64,
    /// Calls resolved by deadline instead of a reply
    pub timeouts: u64,
    /// Non-JSON lines dropped while waiting
    pub lines_discarded: u64,
}
