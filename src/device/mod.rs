//! HarveStar arm façade
//!
//! [`Arm`] is the synchronous, typed API over the [`LinkWorker`]. One `Arm`
//! per physical device; it is `Sync` and meant to be shared behind an `Arc`.
//!
//! # Error policy
//!
//! - [`Arm::move_to`] never fails: timeouts and link errors come back as
//!   `{"type":"error","message":...}` responses.
//! - [`Arm::try_move`] downgrades only timeouts, so a caller can tell a
//!   silent arm apart from a link worker that is gone. A port that never
//!   opened counts as a silent arm.
//! - [`Arm::wait_until_ready`] reports `false` instead of failing.

mod readiness;

pub use readiness::{run_handshake, HandshakeReport, HandshakeTimings, Readiness};

use crate::config::DeviceConfig;
use crate::core::types::{Command, Coords, Response};
use crate::error::{Error, Result};
use crate::link::{LinkStats, LinkWorker};
use parking_lot::Mutex;
use std::time::Duration;

/// Anything the replay sequencer can drive
pub trait MoveTarget: Send + Sync {
    /// Move to `coords`. `Ok` carries the arm's reply, which may itself be
    /// an error response; `Err` means the step could not be attempted.
    fn execute_move(&self, coords: Coords) -> Result<Response>;
}

/// Robot arm controller
pub struct Arm {
    link: LinkWorker,
    config: DeviceConfig,
    /// Last commanded position, informational only
    coords: Mutex<Coords>,
}

impl Arm {
    pub fn new(link: LinkWorker, config: DeviceConfig) -> Self {
        let coords = Mutex::new(config.initial_coords);
        Self {
            link,
            config,
            coords,
        }
    }

    /// Move the arm, always returning a typed response
    pub fn move_to(&self, coords: Coords) -> Response {
        match self.try_move(coords) {
            Ok(resp) => resp,
            Err(e) => {
                log::error!("Move to {:?} failed: {}", coords, e);
                Response::error(e.to_string())
            }
        }
    }

    /// Move the arm; a silent arm yields the "No response received" error
    /// response, any other failure is returned as `Err`
    pub fn try_move(&self, coords: Coords) -> Result<Response> {
        log::info!("Sending move command: {:?}", coords);
        let outcome = self
            .link
            .submit(Command::Move { data: coords }, self.config.move_timeout());

        match outcome {
            Ok(resp) => {
                *self.coords.lock() = coords;
                log::info!("Move response: {}", resp);
                Ok(resp)
            }
            Err(Error::Timeout) => {
                log::warn!("No response received from move command");
                Ok(Response::no_response())
            }
            Err(e) => Err(e),
        }
    }

    /// Ask the arm to run one of its on-board replay sequences
    ///
    /// Waits the link's default response budget.
    pub fn send_replay(&self, index: u32) -> Response {
        log::info!("Sending device replay {}", index);
        match self.link.submit_default(Command::Replay { index }) {
            Ok(resp) => resp,
            Err(Error::Timeout) => Response::no_response(),
            Err(e) => Response::error(e.to_string()),
        }
    }

    /// Send one readiness probe
    pub fn ping(&self, timeout: Duration) -> Result<Response> {
        self.link.submit(Command::Ping, timeout)
    }

    /// Probe until the arm reports `ready` or `timeout` elapses
    pub fn wait_until_ready(&self, timeout: Duration) -> bool {
        self.handshake(timeout).state == Readiness::Ready
    }

    /// Readiness handshake with probe count and timing
    pub fn handshake(&self, timeout: Duration) -> HandshakeReport {
        log::info!("Waiting for arm to be ready (up to {:?})...", timeout);
        let timings = HandshakeTimings {
            timeout,
            probe_timeout: self.config.ping_timeout(),
            retry_delay: self.config.ready_retry_delay(),
        };
        let report = run_handshake(timings, |wait| self.ping(wait));

        match report.state {
            Readiness::Ready => log::info!(
                "Arm is ready ({} probe(s), {:?})",
                report.probes,
                report.elapsed
            ),
            _ => log::warn!(
                "Timeout waiting for arm ready after {} probe(s)",
                report.probes
            ),
        }
        report
    }

    /// Block until the next well-formed message arrives, with no timeout
    ///
    /// Holds the link for as long as it waits: queued commands are served
    /// only after a message arrives or the link shuts down.
    pub fn listen(&self) -> Result<Response> {
        self.link.observe()
    }

    /// Last commanded position
    pub fn last_coords(&self) -> Coords {
        *self.coords.lock()
    }

    pub fn link_stats(&self) -> LinkStats {
        self.link.stats()
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Stop the link worker
    pub fn shutdown(&self) -> Result<()> {
        self.link.shutdown()
    }
}

impl MoveTarget for Arm {
    fn execute_move(&self, coords: Coords) -> Result<Response> {
        self.try_move(coords)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::DEFAULT_RESPONSE_TIMEOUT;
    use crate::transport::{MockTransport, SimulatedArm};
    use approx::assert_relative_eq;
    use std::time::Instant;

    fn fast_config() -> DeviceConfig {
        DeviceConfig {
            move_timeout_ms: 300,
            ping_timeout_ms: 100,
            ready_timeout_ms: 1_000,
            ready_retry_delay_ms: 20,
            ..DeviceConfig::default()
        }
    }

    fn arm_on(transport: &MockTransport, config: DeviceConfig) -> Arm {
        let link = LinkWorker::spawn(transport.clone(), DEFAULT_RESPONSE_TIMEOUT).unwrap();
        Arm::new(link, config)
    }

    #[test]
    fn test_move_acknowledged() {
        let transport = MockTransport::new();
        transport.set_responder(SimulatedArm::new());
        let arm = arm_on(&transport, fast_config());

        let resp = arm.move_to([20.0, 24.0, 2.5, 45.0]);
        assert!(resp.is_kind("ack"));
        let last = arm.last_coords();
        assert_relative_eq!(last[0], 20.0);
        assert_relative_eq!(last[2], 2.5);
        assert_eq!(arm.link_stats().lines_discarded, 1);
    }

    #[test]
    fn test_move_timeout_is_typed() {
        let transport = MockTransport::new();
        let arm = arm_on(&transport, fast_config());

        let start = Instant::now();
        let resp = arm.move_to([10.0, 0.0, 15.0, 45.0]);
        assert_eq!(resp, Response::no_response());
        assert!(start.elapsed() >= Duration::from_millis(290));
        // Position only tracks acknowledged moves
        assert_eq!(arm.last_coords(), [10.5, 0.0, 15.0, 45.0]);
    }

    #[test]
    fn test_move_on_closed_link_times_out() {
        let arm = arm_on(&MockTransport::disconnected(), fast_config());

        let start = Instant::now();
        assert_eq!(arm.move_to([1.0, 2.0, 3.0, 4.0]), Response::no_response());
        assert!(start.elapsed() >= Duration::from_millis(290));
        assert_eq!(
            arm.try_move([1.0, 2.0, 3.0, 4.0]).unwrap(),
            Response::no_response()
        );
        assert_eq!(arm.last_coords(), [10.5, 0.0, 15.0, 45.0]);
    }

    #[test]
    fn test_ready_handshake() {
        let transport = MockTransport::new();
        transport.set_responder(SimulatedArm::booting_after(2));
        let arm = arm_on(&transport, fast_config());

        let report = arm.handshake(Duration::from_secs(2));
        assert_eq!(report.state, Readiness::Ready);
        assert_eq!(report.probes, 3);
        assert_eq!(transport.written_commands(), vec![Command::Ping; 3]);
    }

    #[test]
    fn test_ready_times_out() {
        let transport = MockTransport::new();
        let arm = arm_on(&transport, fast_config());

        let start = Instant::now();
        assert!(!arm.wait_until_ready(Duration::from_millis(400)));
        assert!(start.elapsed() < Duration::from_millis(700));
    }

    #[test]
    fn test_send_replay() {
        let transport = MockTransport::new();
        transport.set_responder(SimulatedArm::new());
        let arm = arm_on(&transport, fast_config());

        let resp = arm.send_replay(2);
        assert!(resp.is_kind("replay"));
        assert_eq!(
            transport.written_commands(),
            vec![Command::Replay { index: 2 }]
        );
    }

    #[test]
    fn test_shutdown_makes_moves_fail() {
        let transport = MockTransport::new();
        let arm = arm_on(&transport, fast_config());
        arm.shutdown().unwrap();
        assert!(matches!(
            arm.execute_move([1.0, 2.0, 3.0, 4.0]),
            Err(Error::LinkShutdown)
        ));
    }
}
