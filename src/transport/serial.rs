//! Serial transport implementation

use super::framing::LineBuffer;
use super::pacing::WritePacer;
use super::Transport;
use crate::error::{Error, Result};
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{Read, Write};
use std::time::{Duration, Instant};

/// Serial transport for the arm's USB CDC port
///
/// A transport whose port failed to open stays permanently closed: writes
/// fail with [`Error::LinkClosed`] and reads return `None`. The link worker
/// turns that into calls that time out, so the gateway keeps running.
pub struct SerialTransport {
    path: String,
    /// `None` once closed or if the open failed
    port: Option<Box<dyn SerialPort>>,
    lines: LineBuffer,
    pacer: WritePacer,
    scratch: [u8; 256],
}

impl SerialTransport {
    /// Open a serial port, returning a closed transport on failure
    ///
    /// # Arguments
    /// * `path` - Serial port path (e.g., "/dev/tty.usbmodem101")
    /// * `baud_rate` - Baud rate (e.g., 115200)
    /// * `read_slice` - Driver-level read timeout; bounds each blocking read
    /// * `min_write_interval` - Pacing floor between writes
    pub fn open(
        path: &str,
        baud_rate: u32,
        read_slice: Duration,
        min_write_interval: Duration,
    ) -> Self {
        match Self::try_open(path, baud_rate, read_slice, min_write_interval) {
            Ok(transport) => transport,
            Err(e) => {
                log::error!("Could not open serial port {}: {}", path, e);
                Self::closed(path, min_write_interval)
            }
        }
    }

    /// Open a serial port, surfacing the connection error
    pub fn try_open(
        path: &str,
        baud_rate: u32,
        read_slice: Duration,
        min_write_interval: Duration,
    ) -> Result<Self> {
        let port = serialport::new(path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(read_slice)
            .open()
            .map_err(|e| Error::Connection(format!("{}: {}", path, e)))?;

        log::info!("Opened serial port: {} at {} baud", path, baud_rate);

        Ok(Self {
            path: path.to_string(),
            port: Some(port),
            lines: LineBuffer::new(),
            pacer: WritePacer::new(min_write_interval),
            scratch: [0u8; 256],
        })
    }

    /// A transport that was never connected
    pub fn closed(path: &str, min_write_interval: Duration) -> Self {
        Self {
            path: path.to_string(),
            port: None,
            lines: LineBuffer::new(),
            pacer: WritePacer::new(min_write_interval),
            scratch: [0u8; 256],
        }
    }

}

impl Transport for SerialTransport {
    fn write_line(&mut self, line: &[u8]) -> Result<()> {
        if self.port.is_none() {
            return Err(Error::LinkClosed);
        }

        self.pacer.wait();

        let port = self.port.as_mut().ok_or(Error::LinkClosed)?;
        let mut framed = Vec::with_capacity(line.len() + 1);
        framed.extend_from_slice(line);
        framed.push(b'\n');
        port.write_all(&framed)?;
        port.flush()?;
        self.pacer.mark();

        log::debug!("[{}] TX: {}", self.path, String::from_utf8_lossy(line));
        Ok(())
    }

    fn read_line(&mut self, timeout: Duration) -> Option<Vec<u8>> {
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(line) = self.lines.next_line() {
                log::debug!("[{}] RX: {}", self.path, String::from_utf8_lossy(&line));
                return Some(line);
            }

            let port = self.port.as_mut()?;
            if Instant::now() >= deadline {
                return None;
            }

            match port.read(&mut self.scratch) {
                Ok(0) => {}
                Ok(n) => self.lines.push(&self.scratch[..n]),
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => {
                    log::error!("[{}] Serial read failed: {}", self.path, e);
                    return None;
                }
            }
        }
    }

    fn close(&mut self) {
        match self.port.take() {
            Some(_) => log::info!("Serial connection {} closed", self.path),
            None => log::debug!("Serial port {} was not open", self.path),
        }
        self.lines.clear();
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn write_delay(&self) -> Duration {
        self.pacer.remaining()
    }
}
