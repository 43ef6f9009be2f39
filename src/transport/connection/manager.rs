//! Handle for the connection task

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use super::config::{ReconnectPolicy, STATUS_CHANNEL_CAPACITY};
use super::lifecycle::{ConnectionCommand, ConnectionTask, Outputs};
use crate::error::{ConsoleError, Result};
use crate::transport::Connector;
use crate::types::connection::Connection;
use crate::types::events::StreamEvent;

/// Receiver of decoded stream events and stream error notifications
pub type EventReceiver = mpsc::UnboundedReceiver<Result<StreamEvent>>;

/// Owns the agent stream lifecycle
///
/// The socket, the reconnect timer and the [`Connection`] snapshot live on a
/// background task; this handle only sends it requests. Decoded events flow
/// to the single receiver handed out by [`take_events`](Self::take_events).
pub struct ConnectionManager<K: Connector> {
    connector: Arc<K>,
    policy: ReconnectPolicy,
    keepalive: Option<Duration>,
    events_tx: mpsc::UnboundedSender<Result<StreamEvent>>,
    events_rx: Option<EventReceiver>,
    status_tx: broadcast::Sender<Connection>,
    snapshot: Arc<watch::Sender<Connection>>,
    command_tx: Option<mpsc::UnboundedSender<ConnectionCommand>>,
    task: Option<JoinHandle<()>>,
}

impl<K: Connector> ConnectionManager<K> {
    /// Create a manager; nothing connects until [`open`](Self::open)
    pub fn new(connector: K, policy: ReconnectPolicy, keepalive: Option<Duration>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (status_tx, _) = broadcast::channel(STATUS_CHANNEL_CAPACITY);
        let (snapshot, _) = watch::channel(Connection::default());
        Self {
            connector: Arc::new(connector),
            policy,
            keepalive,
            events_tx,
            events_rx: Some(events_rx),
            status_tx,
            snapshot: Arc::new(snapshot),
            command_tx: None,
            task: None,
        }
    }

    /// Hand out the event receiver; later calls return `None`
    pub fn take_events(&mut self) -> Option<EventReceiver> {
        self.events_rx.take()
    }

    /// Subscribe to every connection transition
    #[must_use]
    pub fn subscribe_status(&self) -> broadcast::Receiver<Connection> {
        self.status_tx.subscribe()
    }

    /// Current connection snapshot
    #[must_use]
    pub fn connection(&self) -> Connection {
        *self.snapshot.borrow()
    }

    /// Establish the stream
    ///
    /// Returns immediately when the stream is already open. A failed attempt
    /// still schedules a reconnect under the configured policy.
    ///
    /// # Errors
    /// Returns the error of the immediate attempt
    pub async fn open(&mut self) -> Result<()> {
        let command_tx = self.ensure_task();
        let (reply, reply_rx) = oneshot::channel();
        command_tx
            .send(ConnectionCommand::Open { reply })
            .map_err(|_| ConsoleError::closed("connection manager"))?;
        reply_rx
            .await
            .map_err(|_| ConsoleError::closed("connection manager"))?
    }

    /// Tear the stream down; no reconnect follows
    ///
    /// # Errors
    /// Returns error if the connection task panicked
    pub async fn close(&mut self) -> Result<()> {
        let Some(command_tx) = self.command_tx.take() else {
            return Ok(());
        };
        let (reply, reply_rx) = oneshot::channel();
        if command_tx.send(ConnectionCommand::Close { reply }).is_ok() {
            let _ = reply_rx.await;
        }
        if let Some(task) = self.task.take() {
            task.await
                .map_err(|e| ConsoleError::transport(format!("connection task failed: {e}")))?;
        }
        Ok(())
    }

    fn ensure_task(&mut self) -> mpsc::UnboundedSender<ConnectionCommand> {
        let running = self
            .task
            .as_ref()
            .is_some_and(|task| !task.is_finished());
        if let (true, Some(tx)) = (running, self.command_tx.as_ref()) {
            return tx.clone();
        }

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let task = ConnectionTask::new(
            Arc::clone(&self.connector),
            self.policy,
            self.keepalive,
            Outputs {
                events: self.events_tx.clone(),
                status: self.status_tx.clone(),
                snapshot: Arc::clone(&self.snapshot),
            },
            command_rx,
        );
        self.task = Some(tokio::spawn(task.run()));
        self.command_tx = Some(command_tx.clone());
        command_tx
    }
}

impl<K: Connector> Drop for ConnectionManager<K> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl<K: Connector> std::fmt::Debug for ConnectionManager<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("policy", &self.policy)
            .field("keepalive", &self.keepalive)
            .field("connection", &self.connection())
            .finish_non_exhaustive()
    }
}
