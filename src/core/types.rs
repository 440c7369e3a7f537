//! Wire-level data types shared by every layer.
//!
//! - [`Command`]: outbound request, one compact JSON object per line
//! - [`Response`]: any well-formed JSON object read back from the arm
//! - [`Coords`]: `[x, y, z, effector]` target for a move

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Arm target `[x, y, z, effector]` (cm, cm, cm, degrees)
pub type Coords = [f64; 4];

/// Commands understood by the arm firmware
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Command {
    /// Move the end effector to `data`
    Move { data: Coords },
    /// Readiness probe; the firmware answers `{"type":"ready"}` once booted
    Ping,
    /// Run a replay sequence stored on the device itself
    Replay { index: u32 },
}

impl Command {
    /// Tag as it appears in the `type` field
    pub fn kind(&self) -> &'static str {
        match self {
            Command::Move { .. } => "move",
            Command::Ping => "ping",
            Command::Replay { .. } => "replay",
        }
    }

    /// Compact JSON encoding without the trailing newline
    pub fn to_line(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// Reply object parsed from one line of device output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Response(Map<String, Value>);

impl Response {
    /// Parse a raw line. Returns `None` for anything that is not valid JSON.
    ///
    /// Valid JSON that is not an object is wrapped as `{"type":"unknown","value":...}`
    /// so callers can always dispatch on `type`.
    pub fn from_line(line: &[u8]) -> Option<Self> {
        match serde_json::from_slice::<Value>(line).ok()? {
            Value::Object(map) => Some(Self(map)),
            other => {
                let mut map = Map::new();
                map.insert("type".to_string(), Value::from("unknown"));
                map.insert("value".to_string(), other);
                Some(Self(map))
            }
        }
    }

    /// Build a response with a `type` and a `message`
    pub fn with_message(kind: &str, message: impl Into<String>) -> Self {
        let mut map = Map::new();
        map.insert("type".to_string(), Value::from(kind));
        map.insert("message".to_string(), Value::from(message.into()));
        Self(map)
    }

    /// `{"type":"error","message":...}`
    pub fn error(message: impl Into<String>) -> Self {
        Self::with_message("error", message)
    }

    /// `{"type":"done","message":...}`
    pub fn done(message: impl Into<String>) -> Self {
        Self::with_message("done", message)
    }

    /// Synthesized reply for a move that went unanswered
    pub fn no_response() -> Self {
        Self::error("No response received")
    }

    /// Value of the `type` field, if it is a string
    pub fn kind(&self) -> Option<&str> {
        self.0.get("type").and_then(Value::as_str)
    }

    pub fn is_kind(&self, kind: &str) -> bool {
        self.kind() == Some(kind)
    }

    /// Value of the `message` field, if it is a string
    pub fn message(&self) -> Option<&str> {
        self.0.get("message").and_then(Value::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for Response {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(&self.0) {
            Ok(s) => f.write_str(&s),
            Err(_) => f.write_str("{}"),
        }
    }
}
