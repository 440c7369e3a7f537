//! Mock transport for testing and hardware-free runs
//!
//! [`MockTransport`] is a cloneable handle: the link worker owns one clone
//! while a test keeps another to inject device output and inspect what was
//! written. A [`Responder`] can be installed to script replies per command.

use super::framing::LineBuffer;
use super::pacing::WritePacer;
use super::Transport;
use crate::core::types::Command;
use crate::error::{Error, Result};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Scripted device behaviour: maps each written line to the lines it emits
pub trait Responder: Send {
    fn respond(&mut self, line: &[u8]) -> Vec<String>;
}

impl<F> Responder for F
where
    F: FnMut(&[u8]) -> Vec<String> + Send,
{
    fn respond(&mut self, line: &[u8]) -> Vec<String> {
        self(line)
    }
}

/// In-memory line transport
#[derive(Clone)]
pub struct MockTransport {
    shared: Arc<Shared>,
    pacer: WritePacer,
}

struct Shared {
    inner: Mutex<MockTransportInner>,
    readable: Condvar,
}

struct MockTransportInner {
    inbound: LineBuffer,
    written: Vec<Vec<u8>>,
    open: bool,
    responder: Option<Box<dyn Responder>>,
}

impl MockTransport {
    /// Create an open mock transport without write pacing
    pub fn new() -> Self {
        Self::with_min_write_interval(Duration::ZERO)
    }

    /// Create an open mock transport with a pacing floor between writes
    pub fn with_min_write_interval(min_interval: Duration) -> Self {
        MockTransport {
            shared: Arc::new(Shared {
                inner: Mutex::new(MockTransportInner {
                    inbound: LineBuffer::new(),
                    written: Vec::new(),
                    open: true,
                    responder: None,
                }),
                readable: Condvar::new(),
            }),
            pacer: WritePacer::new(min_interval),
        }
    }

    /// Create a mock transport that behaves like a port that failed to open
    pub fn disconnected() -> Self {
        let transport = Self::new();
        transport.shared.inner.lock().open = false;
        transport
    }

    /// Install a responder invoked for every written line
    pub fn set_responder<R: Responder + 'static>(&self, responder: R) {
        self.shared.inner.lock().responder = Some(Box::new(responder));
    }

    /// Inject one line of device output (terminator added)
    pub fn inject_line(&self, line: &str) {
        let mut bytes = line.as_bytes().to_vec();
        bytes.push(b'\n');
        self.inject_bytes(&bytes);
    }

    /// Inject raw device output, framed exactly like serial input
    pub fn inject_bytes(&self, data: &[u8]) {
        let mut inner = self.shared.inner.lock();
        inner.inbound.push(data);
        self.shared.readable.notify_all();
    }

    /// All lines written so far, without terminators
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.shared.inner.lock().written.clone()
    }

    /// Written lines decoded as commands (undecodable lines skipped)
    pub fn written_commands(&self) -> Vec<Command> {
        self.shared
            .inner
            .lock()
            .written
            .iter()
            .filter_map(|line| serde_json::from_slice(line).ok())
            .collect()
    }

    /// Clear written data
    pub fn clear_written(&self) {
        self.shared.inner.lock().written.clear();
    }

    /// Complete lines waiting to be read
    pub fn pending_reads(&self) -> usize {
        self.shared.inner.lock().inbound.pending()
    }
}

impl Transport for MockTransport {
    fn write_line(&mut self, line: &[u8]) -> Result<()> {
        if !self.is_open() {
            return Err(Error::LinkClosed);
        }
        self.pacer.wait();

        let mut inner = self.shared.inner.lock();
        if !inner.open {
            return Err(Error::LinkClosed);
        }
        inner.written.push(line.to_vec());
        self.pacer.mark();

        let replies = match inner.responder.as_mut() {
            Some(responder) => responder.respond(line),
            None => Vec::new(),
        };
        for reply in replies {
            inner.inbound.push(reply.as_bytes());
            inner.inbound.push(b"\n");
        }
        self.shared.readable.notify_all();
        Ok(())
    }

    fn read_line(&mut self, timeout: Duration) -> Option<Vec<u8>> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.shared.inner.lock();
        loop {
            if !inner.open {
                return None;
            }
            if let Some(line) = inner.inbound.next_line() {
                return Some(line);
            }
            if self
                .shared
                .readable
                .wait_until(&mut inner, deadline)
                .timed_out()
            {
                return inner.inbound.next_line().filter(|_| inner.open);
            }
        }
    }

    fn close(&mut self) {
        let mut inner = self.shared.inner.lock();
        inner.open = false;
        inner.inbound.clear();
        self.shared.readable.notify_all();
    }

    fn is_open(&self) -> bool {
        self.shared.inner.lock().open
    }

    fn write_delay(&self) -> Duration {
        self.pacer.remaining()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// Responder that imitates the arm firmware
///
/// Answers `ping` with `ready` once `boot_pings` probes have gone unanswered,
/// acknowledges moves and device replays, and prints a line of non-JSON
/// debug chatter before every acknowledgement like the real firmware does.
pub struct SimulatedArm {
    boot_pings: u32,
    pings_seen: u32,
    position: [f64; 4],
}

impl SimulatedArm {
    pub fn new() -> Self {
        Self::booting_after(0)
    }

    /// Ignore the first `pings` probes as if the firmware were still booting
    pub fn booting_after(pings: u32) -> Self {
        Self {
            boot_pings: pings,
            pings_seen: 0,
            position: [10.5, 0.0, 15.0, 45.0],
        }
    }
}

impl Default for SimulatedArm {
    fn default() -> Self {
        Self::new()
    }
}

impl Responder for SimulatedArm {
    fn respond(&mut self, line: &[u8]) -> Vec<String> {
        match serde_json::from_slice::<Command>(line) {
            Ok(Command::Ping) => {
                self.pings_seen += 1;
                if self.pings_seen > self.boot_pings {
                    vec![r#"{"type":"ready"}"#.to_string()]
                } else {
                    vec!["boot: servos not calibrated".to_string()]
                }
            }
            Ok(Command::Move { data }) => {
                self.position = data;
                vec![
                    format!("dbg: ik solve {:?}", data),
                    serde_json::json!({"type": "ack", "data": data}).to_string(),
                ]
            }
            Ok(Command::Replay { index }) => {
                vec![serde_json::json!({"type": "replay", "index": index, "status": "started"})
                    .to_string()]
            }
            Err(_) => vec![r#"{"type":"error","message":"bad command"}"#.to_string()],
        }
    }
}
