//! Configuration for HarveStar IO
//!
//! Loads configuration from a TOML file. Every section and field has a
//! default, so an empty file (or no file at all) describes the stock setup:
//! the arm's Pico on `/dev/tty.usbmodem101` at 115200 baud.

use crate::core::types::Coords;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub link: LinkConfig,
    pub device: DeviceConfig,
    pub logging: LoggingConfig,
    /// Extra replay sequences appended to the built-in catalog
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub replay: Vec<ReplaySequenceConfig>,
}

/// Which transport backs the link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    /// Real serial port
    Serial,
    /// In-process simulated arm
    Mock,
}

/// Serial link configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LinkConfig {
    pub kind: LinkKind,
    /// Serial port path
    pub port: String,
    pub baud_rate: u32,
    /// Driver-level read timeout; bounds each blocking read call
    pub read_timeout_ms: u64,
    /// Minimum spacing between writes
    pub min_write_interval_ms: u64,
    /// Default overall wait for a reply
    pub response_timeout_ms: u64,
}

impl LinkConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn min_write_interval(&self) -> Duration {
        Duration::from_millis(self.min_write_interval_ms)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            kind: LinkKind::Serial,
            port: "/dev/tty.usbmodem101".to_string(),
            baud_rate: 115200,
            read_timeout_ms: 50,
            min_write_interval_ms: 100,
            response_timeout_ms: 10_000,
        }
    }
}

/// Arm behaviour timings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Wait for a move acknowledgement
    pub move_timeout_ms: u64,
    /// Wait for each readiness probe
    pub ping_timeout_ms: u64,
    /// Overall readiness handshake budget
    pub ready_timeout_ms: u64,
    /// Pause between readiness probes
    pub ready_retry_delay_ms: u64,
    /// Coordinates assumed before the first move
    pub initial_coords: Coords,
}

impl DeviceConfig {
    pub fn move_timeout(&self) -> Duration {
        Duration::from_millis(self.move_timeout_ms)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    pub fn ready_retry_delay(&self) -> Duration {
        Duration::from_millis(self.ready_retry_delay_ms)
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            move_timeout_ms: 5_000,
            ping_timeout_ms: 2_000,
            ready_timeout_ms: 30_000,
            ready_retry_delay_ms: 1_000,
            initial_coords: [10.5, 0.0, 15.0, 45.0],
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` wins if set
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// A replay sequence defined in the config file
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReplaySequenceConfig {
    pub index: u32,
    pub name: String,
    pub steps: Vec<ReplayStepConfig>,
}

/// One move of a configured replay sequence
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReplayStepConfig {
    pub coords: Coords,
    /// Pause after the move is acknowledged
    pub delay_ms: u64,
}

impl AppConfig {
    /// Load configuration from TOML file
    ///
    /// # Example
    /// ```no_run
    /// use harvestar_io::config::AppConfig;
    ///
    /// let config = AppConfig::from_file("harvestar.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the link unusable
    pub fn validate(&self) -> Result<()> {
        if self.link.baud_rate == 0 {
            return Err(Error::Config("link.baud_rate must be positive".to_string()));
        }
        if self.link.read_timeout_ms == 0 {
            return Err(Error::Config(
                "link.read_timeout_ms must be positive".to_string(),
            ));
        }
        if self.link.response_timeout_ms == 0
            || self.device.move_timeout_ms == 0
            || self.device.ping_timeout_ms == 0
        {
            return Err(Error::Config("reply timeouts must be positive".to_string()));
        }

        let mut seen = HashSet::new();
        for seq in &self.replay {
            if !seen.insert(seq.index) {
                return Err(Error::Config(format!(
                    "replay index {} defined more than once",
                    seq.index
                )));
            }
            if seq.steps.is_empty() {
                return Err(Error::Config(format!(
                    "replay '{}' has no steps",
                    seq.name
                )));
            }
            if seq
                .steps
                .iter()
                .any(|step| step.coords.iter().any(|c| !c.is_finite()))
            {
                return Err(Error::Config(format!(
                    "replay '{}' has a non-finite coordinate",
                    seq.name
                )));
            }
        }
        Ok(())
    }
}
