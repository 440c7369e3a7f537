//! Readiness handshake
//!
//! The arm's Pico takes a few seconds to boot and calibrate its servos.
//! Until then it ignores pings or answers with something other than
//! `ready`. The handshake probes repeatedly within an overall budget:
//!
//! ```text
//!               ping answered "ready"
//!   Probing ─────────────────────────────▶ Ready
//!      │  ▲
//!      │  └─ other reply / probe timeout: sleep retry delay
//!      │
//!      └──── budget exhausted ───────────▶ TimedOut
//! ```

use crate::core::types::Response;
use crate::error::Result;
use std::thread;
use std::time::{Duration, Instant};

/// Handshake state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Probing,
    Ready,
    TimedOut,
}

/// Timing knobs for one handshake
#[derive(Debug, Clone, Copy)]
pub struct HandshakeTimings {
    /// Overall budget
    pub timeout: Duration,
    /// Wait for each probe's reply
    pub probe_timeout: Duration,
    /// Pause between probes
    pub retry_delay: Duration,
}

/// Outcome of a completed handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeReport {
    pub state: Readiness,
    pub probes: u32,
    pub elapsed: Duration,
}

/// Run the handshake using `probe` to send one ping
///
/// Never overruns `timings.timeout` by more than scheduling slack: probe
/// waits and retry delays are both clipped to the remaining budget.
pub fn run_handshake<F>(timings: HandshakeTimings, mut probe: F) -> HandshakeReport
where
    F: FnMut(Duration) -> Result<Response>,
{
    let start = Instant::now();
    let mut state = Readiness::Probing;
    let mut probes = 0;

    while state == Readiness::Probing {
        let remaining = timings.timeout.saturating_sub(start.elapsed());
        if remaining.is_zero() {
            state = Readiness::TimedOut;
            break;
        }

        probes += 1;
        match probe(timings.probe_timeout.min(remaining)) {
            Ok(resp) if resp.is_kind("ready") => {
                state = Readiness::Ready;
                break;
            }
            Ok(resp) => log::debug!("Probe {} answered {}, not ready yet", probes, resp),
            Err(e) => log::debug!("Probe {} failed: {}", probes, e),
        }

        let remaining = timings.timeout.saturating_sub(start.elapsed());
        thread::sleep(timings.retry_delay.min(remaining));
    }

    HandshakeReport {
        state,
        probes,
        elapsed: start.elapsed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn timings(timeout_ms: u64) -> HandshakeTimings {
        HandshakeTimings {
            timeout: Duration::from_millis(timeout_ms),
            probe_timeout: Duration::from_millis(50),
            retry_delay: Duration::from_millis(20),
        }
    }

    #[test]
    fn test_ready_on_first_probe() {
        let report = run_handshake(timings(1000), |_| Ok(Response::with_message("ready", "")));
        assert_eq!(report.state, Readiness::Ready);
        assert_eq!(report.probes, 1);
        assert!(report.elapsed < Duration::from_millis(20));
    }

    #[test]
    fn test_ready_after_retries() {
        let mut calls = 0;
        let report = run_handshake(timings(1000), |_| {
            calls += 1;
            if calls < 3 {
                Ok(Response::with_message("booting", ""))
            } else {
                Ok(Response::with_message("ready", ""))
            }
        });
        assert_eq!(report.state, Readiness::Ready);
        assert_eq!(report.probes, 3);
    }

    #[test]
    fn test_times_out_within_budget() {
        let report = run_handshake(timings(200), |wait| {
            thread::sleep(wait);
            Err(Error::Timeout)
        });
        assert_eq!(report.state, Readiness::TimedOut);
        assert!(report.elapsed >= Duration::from_millis(200));
        assert!(report.elapsed < Duration::from_millis(300));
    }

    #[test]
    fn test_probe_wait_clipped_to_budget() {
        let mut waits = Vec::new();
        run_handshake(
            HandshakeTimings {
                timeout: Duration::from_millis(100),
                probe_timeout: Duration::from_secs(2),
                retry_delay: Duration::from_millis(10),
            },
            |wait| {
                waits.push(wait);
                thread::sleep(wait);
                Err(Error::Timeout)
            },
        );
        assert!(waits.iter().all(|w| *w <= Duration::from_millis(100)));
    }
}
