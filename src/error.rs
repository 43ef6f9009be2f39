//! Error types for the browser agent console

use thiserror::Error;

use crate::types::session::SessionState;

/// Main error type for the browser agent console
#[derive(Error, Debug)]
pub enum ConsoleError {
    /// Event stream closed, unreachable or failed mid-read
    #[error("Transport error: {0}")]
    Transport(String),

    /// Command rejected by the backend or lost on the way
    #[error("{operation} failed{}: {message}", status_suffix(.status))]
    Command {
        /// Command name (`start`, `pause`, ...)
        operation: String,
        /// HTTP status code, when the backend answered
        status: Option<u16>,
        /// Error message extracted from the response or the client
        message: String,
    },

    /// Stream payload that could not be decoded into an event
    #[error("Protocol error: {message}")]
    Protocol {
        /// Error message
        message: String,
        /// Raw payload that failed to decode
        payload: Option<String>,
    },

    /// Error reported by the remote agent over the stream
    #[error("Agent error: {0}")]
    Agent(String),

    /// Operation not permitted in the current session state
    #[error("Cannot {operation} while session is {state}")]
    InvalidState {
        /// Rejected operation
        operation: String,
        /// Session state at the time of the call
        state: SessionState,
    },

    /// A `start` was requested while an earlier one is still awaiting its response
    #[error("Cannot start: another start is already in flight")]
    StartInFlight,

    /// Timeout error
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Controller or connection task is no longer running
    #[error("{0} is no longer running")]
    Closed(String),

    /// JSON encode/decode error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|code| format!(" (HTTP {code})")).unwrap_or_default()
}

/// Result type alias for console operations
pub type Result<T> = std::result::Result<T, ConsoleError>;

impl ConsoleError {
    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a command error
    pub fn command(operation: impl Into<String>, status: Option<u16>, msg: impl Into<String>) -> Self {
        Self::Command {
            operation: operation.into(),
            status,
            message: msg.into(),
        }
    }

    /// Create a protocol error
    pub fn protocol(msg: impl Into<String>, payload: Option<String>) -> Self {
        Self::Protocol {
            message: msg.into(),
            payload,
        }
    }

    /// Create an agent error
    pub fn agent(msg: impl Into<String>) -> Self {
        Self::Agent(msg.into())
    }

    /// Create an invalid state error
    pub fn invalid_state(operation: impl Into<String>, state: SessionState) -> Self {
        Self::InvalidState {
            operation: operation.into(),
            state,
        }
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create an invalid configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a closed error for the named component
    pub fn closed(component: impl Into<String>) -> Self {
        Self::Closed(component.into())
    }

    /// Whether this error came from the event stream transport
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Whether this error is a dropped, undecodable stream payload
    #[must_use]
    pub const fn is_protocol(&self) -> bool {
        matches!(self, Self::Protocol { .. })
    }
}
