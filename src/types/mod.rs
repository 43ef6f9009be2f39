//! Type definitions for the browser agent console
//!
//! This module contains the type definitions shared by the connection manager
//! and the session controller, organized into logical submodules:
//!
//! - [`identifiers`] - Type-safe ID wrappers (`TaskId`, `CommandId`)
//! - [`session`] - Session lifecycle state, log entries and frames
//! - [`results`] - Semi-structured result records
//! - [`events`] - Decoded stream events
//! - [`connection`] - Connection status snapshots
//! - [`task`] - Task requests, uploads and the start command body
//! - [`options`] - Configuration with builder and environment loading

pub mod connection;
pub mod events;
pub mod identifiers;
pub mod options;
pub mod results;
pub mod session;
pub mod task;

// Re-export commonly used types
pub use connection::{Connection, ConnectionStatus};
pub use events::StreamEvent;
pub use identifiers::{CommandId, TaskId};
pub use options::{ConsoleOptions, ConsoleOptionsBuilder};
pub use results::ResultRecord;
pub use session::{FrameRef, LogEntry, LogLevel, SessionState};
pub use task::{
    Provider, StartRequest, TaskContext, TaskRequest, UploadFile, UploadedDocument,
    image_data_url,
};
