//! Transport layer for the arm link
//!
//! A transport moves newline-terminated lines over a half-duplex channel.
//! It knows nothing about JSON: the link worker encodes commands before
//! calling [`Transport::write_line`] and decides what to do with the raw
//! lines it gets back from [`Transport::read_line`].

use crate::error::Result;
use std::time::Duration;

pub mod framing;
pub mod mock;
pub mod pacing;
mod serial;

pub use framing::LineBuffer;
pub use mock::{MockTransport, Responder, SimulatedArm};
pub use pacing::{WritePacer, DEFAULT_MIN_WRITE_INTERVAL};
pub use serial::SerialTransport;

/// Line-oriented transport for device communication
pub trait Transport: Send {
    /// Write one line, appending the `\n` terminator, and flush
    ///
    /// Blocks first until the minimum write spacing has elapsed.
    /// Fails with [`crate::Error::LinkClosed`] on a closed link.
    fn write_line(&mut self, line: &[u8]) -> Result<()>;

    /// Wait up to `timeout` for one complete line
    ///
    /// Returns `None` on timeout or when the link is closed. Never fails on
    /// undecodable input; the raw bytes are returned as-is.
    fn read_line(&mut self, timeout: Duration) -> Option<Vec<u8>>;

    /// Release the channel. Safe to call repeatedly.
    fn close(&mut self);

    /// Whether the channel is usable
    fn is_open(&self) -> bool;

    /// How long the next [`Transport::write_line`] would block for pacing
    fn write_delay(&self) -> Duration {
        Duration::ZERO
    }
}

impl Transport for Box<dyn Transport> {
    fn write_line(&mut self, line: &[u8]) -> Result<()> {
        (**self).write_line(line)
    }

    fn read_line(&mut self, timeout: Duration) -> Option<Vec<u8>> {
        (**self).read_line(timeout)
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn write_delay(&self) -> Duration {
        (**self).write_delay()
    }
}
