//! Link worker thread
//!
//! The worker is the only code that touches the transport. Callers hand it
//! a [`PendingCall`] through an unbounded FIFO and block on a private
//! single-slot reply channel. The worker takes the next call only after the
//! current one has resolved, so at most one command is ever in flight.
//!
//! # Reply matching
//!
//! The protocol has no request identifiers. After writing a command the
//! worker reads lines until one parses as JSON and treats that line as the
//! answer. Everything else (boot banners, firmware debug prints, partial
//! garbage) is discarded and the wait continues until the call's deadline.
//!
//! # Closed link
//!
//! A transport that is closed (or never opened) answers nothing. Commands
//! sent to it wait out their deadline and time out, exactly as if the arm
//! were silent. Only an observe request, which has no deadline, fails with
//! [`Error::LinkClosed`].

use super::stats::LinkCounters;
use crate::core::types::{Command, Response};
use crate::error::{Error, Result};
use crate::transport::Transport;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// How often an idle worker checks the shutdown flag
pub(super) const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Read slice used while observing without a deadline
const OBSERVE_READ_SLICE: Duration = Duration::from_millis(200);

/// Back-off after a read that returned early without data
const READ_ERROR_BACKOFF: Duration = Duration::from_millis(10);

/// What the caller wants from the link
#[derive(Debug, Clone)]
pub(super) enum Request {
    /// Write a command and wait for its reply
    Send(Command),
    /// Write nothing; wait for the next well-formed line
    Observe,
}

/// The single in-flight correlation unit
pub(super) struct PendingCall {
    pub request: Request,
    /// `None` only for [`Request::Observe`]
    pub deadline: Option<Instant>,
    pub reply: Sender<Result<Response>>,
}

/// Worker loop - serves one call at a time until shutdown
pub(super) fn worker_loop<T: Transport>(
    mut transport: T,
    calls: Receiver<PendingCall>,
    shutdown: Arc<AtomicBool>,
    counters: Arc<LinkCounters>,
) {
    log::info!("Link worker started");

    while !shutdown.load(Ordering::Relaxed) {
        let call = match calls.recv_timeout(IDLE_POLL_INTERVAL) {
            Ok(call) => call,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                log::debug!("All link handles dropped");
                break;
            }
        };

        let outcome = serve(&mut transport, &call, &shutdown, &counters);
        if let Err(ref e) = outcome {
            log::warn!("Link call {:?} failed: {}", call.request, e);
        }
        if call.reply.send(outcome).is_err() {
            log::debug!("Caller stopped waiting before the reply was published");
        }
    }

    let dropped = calls
        .try_iter()
        .map(|call| call.reply.send(Err(Error::LinkShutdown)))
        .count();
    if dropped > 0 {
        log::warn!("Dropped {} queued link call(s) on shutdown", dropped);
    }

    transport.close();
    log::info!("Link worker exiting");
}

fn serve<T: Transport>(
    transport: &mut T,
    call: &PendingCall,
    shutdown: &AtomicBool,
    counters: &LinkCounters,
) -> Result<Response> {
    match &call.request {
        Request::Send(command) => {
            // Expired while queued, or would expire during write pacing.
            // Writing now would leave an orphan reply on the wire for the
            // next caller.
            let earliest_write = Instant::now() + transport.write_delay();
            if call.deadline.is_some_and(|d| earliest_write >= d) {
                counters.timeouts.fetch_add(1, Ordering::Relaxed);
                return Err(Error::Timeout);
            }

            let line = command.to_line()?;
            match transport.write_line(&line) {
                Ok(()) => {
                    counters.sent.fetch_add(1, Ordering::Relaxed);
                    log::debug!("Sent {} command", command.kind());
                }
                // A closed link swallows the command; the call times out
                Err(Error::LinkClosed) => {
                    log::debug!("Link closed, {} command not sent", command.kind())
                }
                Err(e) => return Err(e),
            }

            await_reply(transport, call.deadline, shutdown, counters)
        }
        Request::Observe => {
            if !transport.is_open() {
                return Err(Error::LinkClosed);
            }
            await_reply(transport, None, shutdown, counters)
        }
    }
}

/// Read lines until one parses as JSON or the deadline passes
fn await_reply<T: Transport>(
    transport: &mut T,
    deadline: Option<Instant>,
    shutdown: &AtomicBool,
    counters: &LinkCounters,
) -> Result<Response> {
    loop {
        let wait = match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    counters.timeouts.fetch_add(1, Ordering::Relaxed);
                    return Err(Error::Timeout);
                }
                deadline - now
            }
            None => {
                if shutdown.load(Ordering::Relaxed) {
                    return Err(Error::LinkShutdown);
                }
                OBSERVE_READ_SLICE
            }
        };

        let started = Instant::now();
        match transport.read_line(wait) {
            Some(line) => match Response::from_line(&line) {
                Some(response) => {
                    counters.replies.fetch_add(1, Ordering::Relaxed);
                    return Ok(response);
                }
                None => {
                    counters.discarded.fetch_add(1, Ordering::Relaxed);
                    log::debug!(
                        "Ignored non-JSON line: {:?}",
                        String::from_utf8_lossy(&line)
                    );
                }
            },
            None if !transport.is_open() => {
                if deadline.is_none() {
                    return Err(Error::LinkClosed);
                }
                if shutdown.load(Ordering::Relaxed) {
                    return Err(Error::LinkShutdown);
                }
                thread::sleep(wait.min(IDLE_POLL_INTERVAL));
            }
            None => {
                if started.elapsed() < wait {
                    thread::sleep(READ_ERROR_BACKOFF);
                }
            }
        }
    }
}
