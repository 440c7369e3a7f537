//! Host-side replay execution
//!
//! Drives a [`MoveTarget`] through a catalog sequence, one step at a time,
//! recording every reply into the shared [`ReplayStatus`].

use super::catalog::{ReplayCatalog, ReplaySequence};
use super::status::ReplayStatus;
use crate::core::types::Response;
use crate::device::MoveTarget;
use crate::error::{Error, Result};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Clears the running flag however the run ends, including by panic
struct RunGuard<'a>(&'a ReplayStatus);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.finish();
    }
}

/// Replays catalog sequences against a move target
pub struct ReplaySequencer {
    target: Arc<dyn MoveTarget>,
    catalog: Arc<ReplayCatalog>,
    status: Arc<ReplayStatus>,
}

impl ReplaySequencer {
    pub fn new(
        target: Arc<dyn MoveTarget>,
        catalog: Arc<ReplayCatalog>,
        status: Arc<ReplayStatus>,
    ) -> Self {
        Self {
            target,
            catalog,
            status,
        }
    }

    pub fn catalog(&self) -> &ReplayCatalog {
        &self.catalog
    }

    pub fn status(&self) -> &Arc<ReplayStatus> {
        &self.status
    }

    /// Run sequence `index` to completion on the calling thread
    ///
    /// An unknown index fails before any state changes, and so does
    /// [`Error::ReplayBusy`] while another run is active. Step failures are
    /// recorded in the status, never returned.
    pub fn run(&self, index: u32) -> Result<()> {
        let sequence = self.lookup(index)?;
        if !self.status.try_begin() {
            return Err(Error::ReplayBusy);
        }
        self.play(index, sequence);
        Ok(())
    }

    /// Run sequence `index` on a background thread named `replay-<index>`
    ///
    /// Fails with [`Error::ReplayBusy`] while another run is active. The
    /// status is already `Running` when this returns, so a poll issued right
    /// after never reports a stale `done`.
    pub fn start(self: &Arc<Self>, index: u32) -> Result<JoinHandle<()>> {
        let sequence = self.lookup(index)?.clone();
        if !self.status.try_begin() {
            return Err(Error::ReplayBusy);
        }

        let sequencer = Arc::clone(self);
        thread::Builder::new()
            .name(format!("replay-{}", index))
            .spawn(move || sequencer.play(index, &sequence))
            .map_err(|e| {
                self.status.finish();
                Error::Io(e)
            })
    }

    fn lookup(&self, index: u32) -> Result<&ReplaySequence> {
        self.catalog.get(index).ok_or_else(|| {
            log::warn!("Replay {} requested but not defined", index);
            Error::UnknownSequence(index)
        })
    }

    /// Execute an already-begun run
    fn play(&self, index: u32, sequence: &ReplaySequence) {
        let _guard = RunGuard(&self.status);
        log::info!(
            "Replay {} ('{}') started: {} steps",
            index,
            sequence.name,
            sequence.steps.len()
        );

        for (n, step) in sequence.steps.iter().enumerate() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                self.target.execute_move(step.coords)
            }))
            .unwrap_or_else(|_| Err(Error::ThreadPanic));

            match outcome {
                Ok(resp) => {
                    log::debug!("Replay {} step {}: {}", index, n + 1, resp);
                    self.status.push(resp);
                    thread::sleep(step.delay);
                }
                Err(e) => {
                    log::error!("Replay {} aborted at step {}: {}", index, n + 1, e);
                    self.status.push(Response::error(e.to_string()));
                    return;
                }
            }
        }

        log::info!("Replay {} completed", index);
        self.status
            .push(Response::done(format!("Replay {} completed!", index)));
    }
}
