//! Command channel to the agent backend
//!
//! Commands only report acceptance. The actual lifecycle transition arrives
//! later over the event stream, so nothing here touches session state.

#[cfg(feature = "http")]
mod http;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::identifiers::TaskId;
use crate::types::session::SessionState;
use crate::types::task::{StartRequest, UploadFile, UploadedDocument};

#[cfg(feature = "http")]
pub use http::HttpCommandChannel;

/// Outbound commands the backend understands
///
/// Implementations must be cheap to share: the session controller runs every
/// call on its own task through an `Arc`.
pub trait CommandChannel: Send + Sync + 'static {
    /// Ask the backend to start a task
    ///
    /// # Errors
    /// Returns error if the backend rejects the task or cannot be reached
    fn start(
        &self,
        request: &StartRequest,
    ) -> impl std::future::Future<Output = Result<StartAck>> + Send;

    /// Ask the backend to pause the running task
    ///
    /// # Errors
    /// Returns error if the backend rejects the command or cannot be reached
    fn pause(&self) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Ask the backend to resume the paused task
    ///
    /// # Errors
    /// Returns error if the backend rejects the command or cannot be reached
    fn resume(&self) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Ask the backend to stop the current task
    ///
    /// # Errors
    /// Returns error if the backend rejects the command or cannot be reached
    fn stop(&self) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Upload a file for use as task context
    ///
    /// # Errors
    /// Returns error if the upload is rejected or cannot be sent
    fn upload(
        &self,
        file: UploadFile,
    ) -> impl std::future::Future<Output = Result<UploadedDocument>> + Send;
}

/// Command names, used in errors and log entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// `start`
    Start,
    /// `pause`
    Pause,
    /// `resume`
    Resume,
    /// `stop`
    Stop,
    /// `upload`
    Upload,
}

impl CommandKind {
    /// Lowercase command name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Stop => "stop",
            Self::Upload => "upload",
        }
    }

    /// States from which the command is expected to succeed
    #[must_use]
    pub const fn expected_states(self) -> &'static [SessionState] {
        match self {
            Self::Start => &[
                SessionState::Idle,
                SessionState::Completed,
                SessionState::Error,
            ],
            Self::Pause => &[SessionState::Running],
            Self::Resume => &[SessionState::Paused],
            Self::Stop => &[SessionState::Running, SessionState::Paused],
            Self::Upload => &[
                SessionState::Idle,
                SessionState::Running,
                SessionState::Paused,
                SessionState::Completed,
                SessionState::Error,
            ],
        }
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Acceptance of a start command
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartAck {
    /// Status word returned by the backend (`started`)
    #[serde(default)]
    pub status: Option<String>,
    /// Task ID, when the backend assigns one up front
    #[serde(default, alias = "taskId")]
    pub task_id: Option<TaskId>,
}

/// Response of `GET /api/v1/agent/status`
///
/// Informational only; the session view is driven by the stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentStatusReport {
    /// Raw status word
    pub status: String,
    /// Steps the agent has finished
    #[serde(default)]
    pub steps_completed: Option<u32>,
    /// Number of results collected so far
    #[serde(default)]
    pub results_count: Option<usize>,
}

impl AgentStatusReport {
    /// Status word as a lifecycle state, when recognised
    #[must_use]
    pub fn state(&self) -> Option<SessionState> {
        serde_json::from_value(serde_json::Value::String(self.status.clone())).ok()
    }
}
