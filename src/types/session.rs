//! Session state and log entry types

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ============================================================================
// Session State
// ============================================================================

/// Lifecycle state of the remote agent session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// No task running
    #[default]
    #[serde(alias = "stopped")]
    Idle,
    /// Task running
    Running,
    /// Task paused by the user
    Paused,
    /// Task finished
    Completed,
    /// Task failed
    #[serde(alias = "failed")]
    Error,
}

impl SessionState {
    /// Whether a new task may be started from this state
    #[must_use]
    pub const fn can_start(self) -> bool {
        matches!(self, Self::Idle | Self::Completed | Self::Error)
    }

    /// Whether the agent is between start and a terminal state
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Running | Self::Paused)
    }

    /// Lowercase wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Log Entries
// ============================================================================

/// Severity of a session log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Dropped payloads and other low-value diagnostics
    Debug,
    /// Progress messages and command acknowledgements
    Info,
    /// Rejected commands, warnings from the agent, connection loss
    Warn,
    /// Agent errors and failed starts
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        })
    }
}

/// Timestamped entry in the user-visible session log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// When the entry was appended
    pub timestamp: DateTime<Utc>,
    /// Entry severity
    pub level: LogLevel,
    /// Entry text
    pub message: String,
}

impl LogEntry {
    /// Create an entry stamped with the current time
    pub fn now(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message: message.into(),
        }
    }
}

// ============================================================================
// Frames
// ============================================================================

/// Reference to the latest screenshot (data URL or image URL)
///
/// Screenshots are large base64 strings republished with every view update,
/// so the text is shared rather than copied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameRef(Arc<str>);

impl FrameRef {
    /// Create a frame reference
    pub fn new(source: impl Into<Arc<str>>) -> Self {
        Self(source.into())
    }

    /// Get the frame source as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the frame is inline image data rather than a URL
    #[must_use]
    pub fn is_data_url(&self) -> bool {
        self.0.starts_with("data:")
    }
}

impl From<String> for FrameRef {
    fn from(s: String) -> Self {
        Self(s.into())
    }
}

impl From<&str> for FrameRef {
    fn from(s: &str) -> Self {
        Self(s.into())
    }
}

impl Serialize for FrameRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for FrameRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::from)
    }
}
