//! Connection manager for the agent stream
//!
//! The manager connects through a [`Connector`](crate::transport::Connector),
//! detects loss, and reconnects under a [`ReconnectPolicy`]. Repeat opens
//! while connected are no-ops and at most one reconnect is pending at a time.
//! After [`ConnectionManager::close`] nothing reconnects until the next
//! explicit open.

mod config;
mod lifecycle;
mod manager;
mod timer;

pub use config::{CONNECT_TIMEOUT, DEFAULT_RECONNECT_INTERVAL, ReconnectPolicy};
pub use manager::{ConnectionManager, EventReceiver};
pub use timer::ReconnectTimer;
