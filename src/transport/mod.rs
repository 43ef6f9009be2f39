//! Transport layer for the agent event stream
//!
//! This module provides the socket abstraction the connection manager runs
//! on, the WebSocket implementation used against a real backend, and the
//! connection manager itself.

pub mod connection;
pub mod websocket;

use crate::error::Result;

/// Factory for fresh stream sockets
///
/// The connection manager calls `connect` once for the initial open and once
/// per reconnect attempt.
pub trait Connector: Send + Sync + 'static {
    /// Socket type produced by this connector
    type Socket: EventSocket;

    /// Establish a new socket
    ///
    /// # Errors
    /// Returns error if the remote end cannot be reached or refuses the
    /// handshake
    fn connect(&self) -> impl std::future::Future<Output = Result<Self::Socket>> + Send;
}

/// Bidirectional text socket carrying JSON events
pub trait EventSocket: Send + 'static {
    /// Receive the next text payload
    ///
    /// Returns `Ok(None)` when the remote end closed the socket.
    ///
    /// # Errors
    /// Returns a transport error if the socket failed mid-read, or a
    /// protocol error for a frame that is not text; the socket stays usable
    /// after the latter
    fn recv(&mut self) -> impl std::future::Future<Output = Result<Option<String>>> + Send;

    /// Send a text payload
    ///
    /// # Errors
    /// Returns error if the write fails
    fn send(&mut self, text: String) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Close the socket
    ///
    /// # Errors
    /// Returns error if the close handshake fails
    fn close(&mut self) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub use connection::{ConnectionManager, ReconnectPolicy, ReconnectTimer};
pub use websocket::{WebSocketConnector, WebSocketSocket};
