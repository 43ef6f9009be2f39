//! Decoded stream events
//!
//! Every inbound WebSocket payload is a JSON object with a `type`
//! discriminator. Kinds this crate does not know decode to
//! [`StreamEvent::Unknown`] so newer backends stay compatible.

use serde::{Deserialize, Serialize};

use super::identifiers::TaskId;
use super::results::ResultRecord;
use super::session::{FrameRef, SessionState};

/// Event pushed by the backend over the agent stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Greeting sent on every (re)connect with the backend's current state
    Connected {
        /// Backend state at connect time
        #[serde(default)]
        status: Option<SessionState>,
    },
    /// Lifecycle transition of the agent
    Status {
        /// New lifecycle state
        status: SessionState,
        /// Optional human-readable message
        #[serde(default)]
        message: Option<String>,
        /// Task the transition belongs to
        #[serde(default, alias = "taskId")]
        task_id: Option<TaskId>,
        /// Complete result set, sent with `completed`
        #[serde(default, alias = "final")]
        final_results: Option<Vec<ResultRecord>>,
    },
    /// Progress of one agent step
    Step {
        /// Step description
        #[serde(default)]
        message: Option<String>,
        /// Page the agent is on
        #[serde(default)]
        url: Option<String>,
        /// Screenshot taken after the step
        #[serde(default)]
        screenshot: Option<FrameRef>,
        /// Complete result set so far
        #[serde(default)]
        results: Option<Vec<ResultRecord>>,
    },
    /// Fatal agent error
    Error {
        /// Error description
        #[serde(default)]
        message: Option<String>,
    },
    /// Non-fatal warning from the agent
    Warning {
        /// Warning description
        message: String,
    },
    /// Standalone screenshot
    Screenshot {
        /// Data URL or image URL
        #[serde(alias = "data")]
        screenshot: FrameRef,
    },
    /// Keepalive reply
    Pong,
    /// Kind not understood by this client
    #[serde(skip)]
    Unknown {
        /// Value of the `type` field
        kind: String,
    },
}

impl StreamEvent {
    /// Wire name of the event kind
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::Connected { .. } => "connected",
            Self::Status { .. } => "status",
            Self::Step { .. } => "step",
            Self::Error { .. } => "error",
            Self::Warning { .. } => "warning",
            Self::Screenshot { .. } => "screenshot",
            Self::Pong => "pong",
            Self::Unknown { kind } => kind,
        }
    }

    /// Lifecycle state carried by the event, if any
    ///
    /// `error` events force [`SessionState::Error`].
    #[must_use]
    pub const fn reported_state(&self) -> Option<SessionState> {
        match self {
            Self::Connected { status } => *status,
            Self::Status { status, .. } => Some(*status),
            Self::Error { .. } => Some(SessionState::Error),
            _ => None,
        }
    }

    /// Whether the event carries authoritative lifecycle state
    #[must_use]
    pub const fn is_state_bearing(&self) -> bool {
        self.reported_state().is_some()
    }
}
