//! Connection snapshot types

use serde::{Deserialize, Serialize};

/// Status of the agent stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// Attempt in progress
    Connecting,
    /// Stream established
    Open,
    /// No stream; a reconnect may be pending
    #[default]
    Closed,
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
        })
    }
}

/// Snapshot of the connection, published on every transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Connection {
    /// Current status
    pub status: ConnectionStatus,
    /// Reconnect attempts since the last successful open
    pub retry_count: u32,
}

impl Connection {
    /// Whether the stream is currently open
    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self.status, ConnectionStatus::Open)
    }
}
