//! Session view model and event reconciliation

use serde::Serialize;

use crate::command::StartAck;
use crate::error::ConsoleError;
use crate::types::events::StreamEvent;
use crate::types::identifiers::TaskId;
use crate::types::results::ResultRecord;
use crate::types::session::{FrameRef, LogEntry, LogLevel, SessionState};

/// View model of the active automation run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Session {
    /// Lifecycle state
    pub state: SessionState,
    /// Task ID, once acknowledged by the backend
    pub task_id: Option<TaskId>,
    /// Append-only user-visible log
    pub log: Vec<LogEntry>,
    /// Most recent screenshot
    pub latest_frame: Option<FrameRef>,
    /// Page reported by the last step
    pub current_url: Option<String>,
    /// Latest result set
    pub results: Vec<ResultRecord>,
    /// Set by an optimistic start until the stream confirms a state
    pub awaiting_confirmation: bool,
    /// Number of state-bearing events applied so far
    pub state_revision: u64,
}

impl Session {
    /// Create an idle session
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `start` is currently allowed by state
    #[must_use]
    pub const fn can_start(&self) -> bool {
        self.state.can_start()
    }

    /// Apply one decoded stream event
    ///
    /// Returns whether the session changed.
    pub fn apply_event(&mut self, event: StreamEvent) -> bool {
        match event {
            StreamEvent::Connected { status: Some(status) } => {
                self.set_state(status);
            }
            StreamEvent::Connected { status: None } => return false,
            StreamEvent::Status {
                status,
                message,
                task_id,
                final_results,
            } => {
                self.set_state(status);
                if task_id.is_some() {
                    self.task_id = task_id;
                }
                if let Some(message) = message {
                    self.push_log(LogLevel::Info, message);
                }
                if let Some(results) = final_results {
                    self.results = results;
                }
            }
            StreamEvent::Step {
                message,
                url,
                screenshot,
                results,
            } => {
                if let Some(message) = message {
                    self.push_log(LogLevel::Info, message);
                }
                if let Some(results) = results {
                    self.results = results;
                }
                if screenshot.is_some() {
                    self.latest_frame = screenshot;
                }
                if url.is_some() {
                    self.current_url = url;
                }
            }
            StreamEvent::Error { message } => {
                self.set_state(SessionState::Error);
                self.push_log(
                    LogLevel::Error,
                    message.unwrap_or_else(|| "Agent reported an error".to_string()),
                );
            }
            StreamEvent::Warning { message } => {
                self.push_log(LogLevel::Warn, message);
            }
            StreamEvent::Screenshot { screenshot } => {
                self.latest_frame = Some(screenshot);
            }
            StreamEvent::Pong => return false,
            StreamEvent::Unknown { kind } => {
                log::debug!("Ignoring stream event of unknown kind '{kind}'");
                return false;
            }
        }
        true
    }

    /// Record an error notification from the stream
    ///
    /// Undecodable payloads leave a debug entry, transport problems a
    /// warning. Nothing else changes.
    pub fn record_stream_error(&mut self, error: &ConsoleError) {
        match error {
            ConsoleError::Protocol { message, .. } => {
                self.push_log(
                    LogLevel::Debug,
                    format!("Dropped stream payload: {message}"),
                );
            }
            other => {
                self.push_log(LogLevel::Warn, format!("Agent stream: {other}"));
            }
        }
    }

    /// Record an accepted start command
    ///
    /// `issued_revision` is the [`state_revision`](Self::state_revision) at
    /// the time the command was sent. When the stream has reported a state
    /// since then, that report stands; otherwise the session moves to
    /// Running and waits for confirmation.
    pub fn acknowledge_start(&mut self, ack: StartAck, issued_revision: u64) {
        let optimistic = self.state_revision == issued_revision;
        if optimistic {
            self.task_id = ack.task_id;
            self.state = SessionState::Running;
            self.awaiting_confirmation = true;
            self.results.clear();
            self.latest_frame = None;
            self.current_url = None;
        } else if ack.task_id.is_some() {
            self.task_id = ack.task_id;
        }

        let message = match &self.task_id {
            Some(id) => format!("Task started ({id})"),
            None => "Task started".to_string(),
        };
        self.push_log(LogLevel::Info, message);
    }

    /// Append a log entry stamped with the current time
    pub fn push_log(&mut self, level: LogLevel, message: impl Into<String>) {
        self.log.push(LogEntry::now(level, message));
    }

    /// Log entries at or above `level`
    pub fn log_at_least(&self, level: LogLevel) -> impl Iterator<Item = &LogEntry> {
        self.log.iter().filter(move |entry| entry.level >= level)
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            log::info!("Session {} -> {}", self.state, state);
        }
        self.state = state;
        self.awaiting_confirmation = false;
        self.state_revision += 1;
    }
}
