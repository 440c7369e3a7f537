//! Minimum spacing between outbound writes
//!
//! The arm firmware parses one command at a time and drops input that arrives
//! while it is still busy. Every write therefore waits until at least
//! `min_interval` has passed since the previous one completed.

use std::thread;
use std::time::{Duration, Instant};

/// Default spacing between writes
pub const DEFAULT_MIN_WRITE_INTERVAL: Duration = Duration::from_millis(100);

/// Pacing floor for writes. Never queues or reorders, only delays.
#[derive(Debug, Clone)]
pub struct WritePacer {
    min_interval: Duration,
    last_write: Option<Instant>,
}

impl WritePacer {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_write: None,
        }
    }

    /// How long the next write must still wait
    pub fn remaining(&self) -> Duration {
        match self.last_write {
            Some(last) => self.min_interval.saturating_sub(last.elapsed()),
            None => Duration::ZERO,
        }
    }

    /// Block until a write is allowed
    pub fn wait(&self) {
        let remaining = self.remaining();
        if !remaining.is_zero() {
            thread::sleep(remaining);
        }
    }

    /// Record that a write just completed
    pub fn mark(&mut self) {
        self.last_write = Some(Instant::now());
    }
}

impl Default for WritePacer {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_WRITE_INTERVAL)
    }
}
