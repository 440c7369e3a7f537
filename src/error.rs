//! Error types for HarveStar IO

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// HarveStar IO error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Serial port error
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode/decode error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration file could not be parsed
    #[error("Config parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Link could not be opened
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Operation attempted on a closed or never-opened link
    #[error("Link is closed")]
    LinkClosed,

    /// No well-formed reply within the wait budget
    #[error("Communication timeout")]
    Timeout,

    /// Link worker stopped before the call was served
    #[error("Link worker has shut down")]
    LinkShutdown,

    /// Replay index not present in the catalog
    #[error("Replay index {0} not defined")]
    UnknownSequence(u32),

    /// A replay is already running
    #[error("A replay is already running")]
    ReplayBusy,

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Background thread panicked
    #[error("Thread panicked")]
    ThreadPanic,

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}
