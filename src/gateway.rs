//! Application-facing gateway
//!
//! Owns the arm, the replay sequencer and the state the request handlers
//! share: the cached readiness outcome and the background replay thread.

use crate::config::{AppConfig, LinkConfig, LinkKind};
use crate::core::types::{Coords, Response};
use crate::device::{Arm, MoveTarget};
use crate::error::{Error, Result};
use crate::link::{LinkStats, LinkWorker};
use crate::replay::{ReplayCatalog, ReplayPoll, ReplaySequencer, ReplayStatus};
use crate::transport::{MockTransport, SerialTransport, SimulatedArm};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

pub struct Gateway {
    arm: Arc<Arm>,
    sequencer: Arc<ReplaySequencer>,
    /// Latched once the arm has answered `ready`
    ready: AtomicBool,
    replay_thread: Mutex<Option<JoinHandle<()>>>,
}

impl Gateway {
    pub fn new(arm: Arm, catalog: ReplayCatalog) -> Self {
        let arm = Arc::new(arm);
        let target: Arc<dyn MoveTarget> = arm.clone();
        let sequencer = Arc::new(ReplaySequencer::new(
            target,
            Arc::new(catalog),
            Arc::new(ReplayStatus::new()),
        ));
        Self {
            arm,
            sequencer,
            ready: AtomicBool::new(false),
            replay_thread: Mutex::new(None),
        }
    }

    /// Build the full stack described by `config`
    ///
    /// A serial port that fails to open does not fail construction; the
    /// gateway comes up with a closed link and every command times out.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let link = open_link(&config.link)?;
        let catalog = ReplayCatalog::with_extra(&config.replay)?;
        log::info!(
            "Replay catalog: {}",
            catalog
                .iter()
                .map(|(i, s)| format!("{}={}", i, s.name))
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(Self::new(Arm::new(link, config.device.clone()), catalog))
    }

    /// Move the arm; the reply is always a JSON object
    pub fn move_arm(&self, coords: Coords) -> Response {
        self.arm.move_to(coords)
    }

    /// Whether the arm is ready, probing for up to `timeout` if not yet seen
    pub fn arm_ready(&self, timeout: Duration) -> bool {
        if self.ready.load(Ordering::Acquire) {
            return true;
        }
        let ready = self.arm.wait_until_ready(timeout);
        if ready {
            self.ready.store(true, Ordering::Release);
        }
        ready
    }

    /// Readiness check with the configured budget
    pub fn arm_ready_default(&self) -> bool {
        self.arm_ready(self.arm.config().ready_timeout())
    }

    /// Next message from the arm
    pub fn listen(&self) -> Result<Response> {
        self.arm.listen()
    }

    /// Start a host-side replay in the background
    pub fn start_replay(&self, index: u32) -> Result<()> {
        let handle = self.sequencer.start(index)?;
        // The previous run has finished if start succeeded
        if let Some(previous) = self.replay_thread.lock().replace(handle) {
            if previous.join().is_err() {
                log::error!("Previous replay thread panicked");
            }
        }
        Ok(())
    }

    /// Run a host-side replay on the calling thread
    ///
    /// Shares the one-run-at-a-time claim with [`Gateway::start_replay`].
    pub fn run_replay(&self, index: u32) -> Result<()> {
        self.sequencer.run(index)
    }

    /// Drain replay progress
    pub fn poll_replay(&self) -> ReplayPoll {
        self.sequencer.status().poll()
    }

    /// Ask the arm to play one of its on-board sequences
    pub fn trigger_device_replay(&self, index: u32) -> Response {
        self.arm.send_replay(index)
    }

    pub fn last_coords(&self) -> Coords {
        self.arm.last_coords()
    }

    pub fn link_stats(&self) -> LinkStats {
        self.arm.link_stats()
    }

    pub fn catalog(&self) -> &ReplayCatalog {
        self.sequencer.catalog()
    }

    /// Stop the link and wait for any replay thread to wind down
    ///
    /// A replay in progress fails its next step and records the error.
    pub fn shutdown(&self) -> Result<()> {
        let link_result = self.arm.shutdown();
        if let Some(handle) = self.replay_thread.lock().take() {
            handle.join().map_err(|_| Error::ThreadPanic)?;
        }
        link_result
    }
}

/// Spawn a link worker over the transport `config` selects
pub fn open_link(config: &LinkConfig) -> Result<LinkWorker> {
    match config.kind {
        LinkKind::Serial => {
            let transport = SerialTransport::open(
                &config.port,
                config.baud_rate,
                config.read_timeout(),
                config.min_write_interval(),
            );
            LinkWorker::spawn(transport, config.response_timeout())
        }
        LinkKind::Mock => {
            log::info!("Using simulated arm instead of {}", config.port);
            let transport = MockTransport::with_min_write_interval(config.min_write_interval());
            transport.set_responder(SimulatedArm::new());
            LinkWorker::spawn(transport, config.response_timeout())
        }
    }
}
