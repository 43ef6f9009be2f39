//! # Browser Agent Console
//!
//! Client-side control core for a remote AI browser-automation agent. The
//! backend runs the agent; this crate drives it and mirrors its progress.
//!
//! Two components cooperate:
//!
//! - [`ConnectionManager`] owns the WebSocket event stream: connect, decode,
//!   detect loss, reconnect under a [`ReconnectPolicy`].
//! - [`SessionController`] owns the [`Session`] view model: it issues
//!   start/pause/resume/stop over a [`CommandChannel`], applies stream events,
//!   and publishes snapshots to subscribers.
//!
//! ## Quick Start
//!
//! ```no_run
//! use browser_agent_console::{
//!     ConnectionManager, ConsoleOptions, HttpCommandChannel, SessionController, TaskRequest,
//!     WebSocketConnector,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let options = ConsoleOptions::from_env()?;
//!
//!     let mut connection = ConnectionManager::new(
//!         WebSocketConnector::new(options.stream_url()?),
//!         options.reconnect,
//!         options.keepalive,
//!     );
//!     let events = connection.take_events().ok_or("event receiver already taken")?;
//!     connection.open().await?;
//!
//!     let controller =
//!         SessionController::spawn(HttpCommandChannel::new(&options)?, events, &options);
//!     controller.start(TaskRequest::new("find the price of X")).await?;
//!
//!     let mut view = controller.subscribe();
//!     while view.changed().await.is_ok() {
//!         let session = view.borrow_and_update().clone();
//!         log::info!("{} ({} results)", session.state, session.results.len());
//!         if session.state == browser_agent_console::SessionState::Completed {
//!             break;
//!         }
//!     }
//!
//!     connection.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`types`]: Core type definitions, newtypes, and builders
//! - [`transport`]: Socket traits, WebSocket implementation, connection manager
//! - [`message`]: Stream payload decoding
//! - [`command`]: Command channel trait and its HTTP implementation
//! - [`session`]: Session view model and controller
//! - [`export`]: CSV and JSON result export
//! - [`error`]: Error types and handling
//!
//! ## Feature Flags
//!
//! - `http` (default) - Enables [`HttpCommandChannel`] (requires `reqwest`)
//!   and the `browser-agent-console` binary
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T, ConsoleError>`](Result). Stream
//! problems never surface as errors from the controller; they are recorded
//! in the session log and the manager reconnects on its own.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod command;
pub mod error;
pub mod export;
pub mod message;
pub mod session;
pub mod transport;
pub mod types;

// Re-export commonly used types for external API
#[cfg(feature = "http")]
pub use command::HttpCommandChannel;
pub use command::{AgentStatusReport, CommandChannel, CommandKind, StartAck};
pub use error::{ConsoleError, Result};
pub use export::{results_to_csv, results_to_json, write_csv, write_json};
pub use message::parse_event;
pub use session::{Session, SessionController};
pub use transport::connection::EventReceiver;
pub use transport::{
    ConnectionManager, Connector, EventSocket, ReconnectPolicy, ReconnectTimer,
    WebSocketConnector, WebSocketSocket,
};

// Re-export type submodules for flat public API
pub use types::connection::{Connection, ConnectionStatus};
pub use types::events::StreamEvent;
pub use types::identifiers::{CommandId, TaskId};
pub use types::options::{ConsoleOptions, ConsoleOptionsBuilder};
pub use types::results::ResultRecord;
pub use types::session::{FrameRef, LogEntry, LogLevel, SessionState};
pub use types::task::{
    Provider, StartRequest, TaskContext, TaskRequest, UploadFile, UploadedDocument,
    image_data_url,
};

/// Version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
