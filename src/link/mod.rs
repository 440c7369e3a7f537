//! Serialized access to the arm link
//!
//! [`LinkWorker`] owns the transport on a dedicated thread and is the single
//! point through which every command reaches the wire. It is `Sync`: any
//! number of threads may call [`LinkWorker::submit`] concurrently and are
//! served strictly in submission order.
//!
//! ```text
//!  caller A ──┐                      ┌──────────────┐
//!  caller B ──┼─▶ FIFO of calls ───▶ │ link-worker  │ ─▶ write_line ─▶ wire
//!  caller C ──┘                      │ (one at a    │ ◀─ read_line  ◀─ wire
//!       ▲                            │  time)       │
//!       └──── per-call reply slot ◀──└──────────────┘
//! ```

mod stats;
mod worker;

pub use stats::LinkStats;

use crate::core::types::{Command, Response};
use crate::error::{Error, Result};
use crate::transport::Transport;
use crossbeam_channel::{RecvTimeoutError, Sender};
use parking_lot::Mutex;
use stats::LinkCounters;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use worker::{PendingCall, Request};

/// Default overall wait for a reply
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(10);

/// Extra time a caller waits past its deadline for the worker to publish
const REPLY_GRACE: Duration = Duration::from_millis(250);

/// Owner of the link transport and its worker thread
pub struct LinkWorker {
    calls: Sender<PendingCall>,
    /// Shutdown signal - set to true to stop the worker
    shutdown: Arc<AtomicBool>,
    /// Worker thread handle - joined on shutdown
    handle: Mutex<Option<JoinHandle<()>>>,
    counters: Arc<LinkCounters>,
    default_timeout: Duration,
}

impl LinkWorker {
    /// Move `transport` onto a new worker thread
    pub fn spawn<T>(transport: T, default_timeout: Duration) -> Result<Self>
    where
        T: Transport + 'static,
    {
        let (calls, queue) = crossbeam_channel::unbounded();
        let shutdown = Arc::new(AtomicBool::new(false));
        let counters = Arc::new(LinkCounters::default());

        let worker_shutdown = Arc::clone(&shutdown);
        let worker_counters = Arc::clone(&counters);
        let handle = thread::Builder::new()
            .name("link-worker".to_string())
            .spawn(move || {
                worker::worker_loop(transport, queue, worker_shutdown, worker_counters);
            })
            .map_err(|e| Error::Other(format!("Failed to spawn link worker: {}", e)))?;

        Ok(Self {
            calls,
            shutdown,
            handle: Mutex::new(Some(handle)),
            counters,
            default_timeout,
        })
    }

    /// Send `command` and block until its reply or `timeout`
    ///
    /// Fails with [`Error::Timeout`] if no well-formed JSON line arrives in
    /// time, including time spent queued behind other callers.
    pub fn submit(&self, command: Command, timeout: Duration) -> Result<Response> {
        let deadline = Instant::now() + timeout;
        let reply = self.enqueue(Request::Send(command), Some(deadline))?;

        match reply.recv_timeout(timeout + REPLY_GRACE) {
            Ok(outcome) => outcome,
            Err(RecvTimeoutError::Timeout) => Err(Error::Timeout),
            Err(RecvTimeoutError::Disconnected) => Err(Error::LinkShutdown),
        }
    }

    /// [`submit`](Self::submit) with the configured default budget
    pub fn submit_default(&self, command: Command) -> Result<Response> {
        self.submit(command, self.default_timeout)
    }

    /// Wait, without a deadline, for the next well-formed line on the link
    ///
    /// Goes through the same queue as commands, so it holds the link until
    /// something arrives and every later caller waits behind it.
    pub fn observe(&self) -> Result<Response> {
        let reply = self.enqueue(Request::Observe, None)?;
        reply.recv().unwrap_or(Err(Error::LinkShutdown))
    }

    fn enqueue(
        &self,
        request: Request,
        deadline: Option<Instant>,
    ) -> Result<crossbeam_channel::Receiver<Result<Response>>> {
        if self.is_shut_down() {
            return Err(Error::LinkShutdown);
        }
        let (reply, slot) = crossbeam_channel::bounded(1);
        self.calls
            .send(PendingCall {
                request,
                deadline,
                reply,
            })
            .map_err(|_| Error::LinkShutdown)?;
        Ok(slot)
    }

    /// Traffic counters
    pub fn stats(&self) -> LinkStats {
        self.counters.snapshot()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Stop the worker after the in-progress call and wait for it to exit
    ///
    /// Calls still queued are dropped; their callers get
    /// [`Error::LinkShutdown`]. Safe to call more than once.
    pub fn shutdown(&self) -> Result<()> {
        self.shutdown.store(true, Ordering::Relaxed);

        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            log::info!("Shutting down link worker...");
            handle.join().map_err(|_| Error::ThreadPanic)?;
            log::info!("Link worker shutdown complete");
        }
        Ok(())
    }
}

impl Drop for LinkWorker {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}
