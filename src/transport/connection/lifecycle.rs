//! Connection task: owns the socket, the reconnect timer and the snapshot

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::{Interval, MissedTickBehavior};

use super::config::{CONNECT_TIMEOUT, PING_PAYLOAD, ReconnectPolicy};
use super::timer::ReconnectTimer;
use crate::error::{ConsoleError, Result};
use crate::message::parse_event;
use crate::transport::{Connector, EventSocket};
use crate::types::connection::{Connection, ConnectionStatus};
use crate::types::events::StreamEvent;

/// Requests from the manager handle to its task
pub(super) enum ConnectionCommand {
    Open {
        reply: oneshot::Sender<Result<()>>,
    },
    Close {
        reply: oneshot::Sender<()>,
    },
}

/// Why the task is about to exit
enum Stop {
    Requested(oneshot::Sender<()>),
    HandleDropped,
}

/// Channels the task publishes on
pub(super) struct Outputs {
    pub events: mpsc::UnboundedSender<Result<StreamEvent>>,
    pub status: broadcast::Sender<Connection>,
    pub snapshot: Arc<watch::Sender<Connection>>,
}

pub(super) struct ConnectionTask<K: Connector> {
    connector: Arc<K>,
    policy: ReconnectPolicy,
    keepalive_period: Option<Duration>,
    keepalive: Option<Interval>,
    outputs: Outputs,
    socket: Option<K::Socket>,
    timer: ReconnectTimer,
    state: Connection,
    commands: mpsc::UnboundedReceiver<ConnectionCommand>,
    stop: Option<Stop>,
}

impl<K: Connector> ConnectionTask<K> {
    pub(super) fn new(
        connector: Arc<K>,
        policy: ReconnectPolicy,
        keepalive_period: Option<Duration>,
        outputs: Outputs,
        commands: mpsc::UnboundedReceiver<ConnectionCommand>,
    ) -> Self {
        let state = *outputs.snapshot.borrow();
        Self {
            connector,
            policy,
            keepalive_period,
            keepalive: None,
            outputs,
            socket: None,
            timer: ReconnectTimer::new(),
            state,
            commands,
            stop: None,
        }
    }

    /// Run until `close()` or until the manager handle is dropped
    pub(super) async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(ConnectionCommand::Open { reply }) => {
                        let result = self.handle_open().await;
                        let _ = reply.send(result);
                    }
                    Some(ConnectionCommand::Close { reply }) => {
                        self.stop = Some(Stop::Requested(reply));
                    }
                    None => self.stop = Some(Stop::HandleDropped),
                },
                frame = next_frame(&mut self.socket) => self.handle_frame(frame),
                () = self.timer.fired() => self.reconnect().await,
                () = next_tick(&mut self.keepalive) => self.ping().await,
            }

            if let Some(stop) = self.stop.take() {
                self.shutdown().await;
                if let Stop::Requested(reply) = stop {
                    let _ = reply.send(());
                }
                break;
            }
        }
        log::debug!("Connection task exited");
    }

    async fn handle_open(&mut self) -> Result<()> {
        if self.socket.is_some() {
            return Ok(());
        }
        // An explicit open replaces any pending retry and restarts the
        // policy from its first attempt.
        self.timer.cancel();
        match self.connect_once(0).await {
            Ok(()) => Ok(()),
            Err(e) => {
                if self.stop.is_none() {
                    log::warn!("Agent stream open failed: {e}");
                    self.schedule_reconnect();
                }
                Err(e)
            }
        }
    }

    /// One connect attempt; leaves the status at Open or Closed
    ///
    /// Keeps serving commands while the attempt is in flight. A close request
    /// abandons the attempt and is recorded in `self.stop`; opens wait for
    /// the attempt's outcome.
    async fn connect_once(&mut self, retry_count: u32) -> Result<()> {
        self.transition(ConnectionStatus::Connecting, retry_count);
        let connector = Arc::clone(&self.connector);
        let connect = tokio::time::timeout(CONNECT_TIMEOUT, connector.connect());
        tokio::pin!(connect);

        let mut waiting = Vec::new();
        let attempt = loop {
            tokio::select! {
                attempt = &mut connect => break Some(attempt),
                command = self.commands.recv() => match command {
                    Some(ConnectionCommand::Open { reply }) => waiting.push(reply),
                    Some(ConnectionCommand::Close { reply }) => {
                        self.stop = Some(Stop::Requested(reply));
                        break None;
                    }
                    None => {
                        self.stop = Some(Stop::HandleDropped);
                        break None;
                    }
                },
            }
        };

        let result = self.finish_connect(attempt, retry_count);
        for reply in waiting {
            let shared = match &result {
                Ok(()) => Ok(()),
                Err(e) => Err(ConsoleError::transport(e.to_string())),
            };
            let _ = reply.send(shared);
        }
        result
    }

    fn finish_connect(
        &mut self,
        attempt: Option<std::result::Result<Result<K::Socket>, tokio::time::error::Elapsed>>,
        retry_count: u32,
    ) -> Result<()> {
        let result = match attempt {
            None => {
                log::debug!("Connect attempt abandoned by close");
                return Err(ConsoleError::closed("connection manager"));
            }
            Some(Ok(result)) => result,
            Some(Err(_)) => Err(ConsoleError::timeout(format!(
                "connect did not complete within {CONNECT_TIMEOUT:?}"
            ))),
        };
        match result {
            Ok(socket) => {
                self.socket = Some(socket);
                self.timer.cancel();
                self.keepalive = self.keepalive_period.map(|period| {
                    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
                    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    interval
                });
                self.transition(ConnectionStatus::Open, 0);
                log::info!("Agent stream open");
                Ok(())
            }
            Err(e) => {
                self.transition(ConnectionStatus::Closed, retry_count);
                Err(e)
            }
        }
    }

    async fn reconnect(&mut self) {
        let attempt = self.state.retry_count.saturating_add(1);
        log::info!("Reconnecting agent stream (attempt {attempt})");
        if let Err(e) = self.connect_once(attempt).await {
            if self.stop.is_none() {
                log::warn!("Reconnect attempt {attempt} failed: {e}");
                self.schedule_reconnect();
            }
        }
    }

    fn schedule_reconnect(&mut self) {
        let attempt = self.state.retry_count.saturating_add(1);
        match self.policy.delay_for(attempt) {
            Some(delay) => {
                if self.timer.schedule(delay) {
                    log::debug!("Reconnect attempt {attempt} scheduled in {delay:?}");
                }
            }
            None => {
                log::error!(
                    "Agent stream reconnect gave up after {} attempt(s)",
                    self.state.retry_count
                );
                let _ = self.outputs.events.send(Err(ConsoleError::transport(format!(
                    "reconnect gave up after {} attempt(s)",
                    self.state.retry_count
                ))));
            }
        }
    }

    fn handle_frame(&mut self, frame: Result<Option<String>>) {
        match frame {
            Ok(Some(text)) => self.forward(parse_event(&text)),
            // Undecodable frame; the socket itself is fine.
            Err(e) if e.is_protocol() => self.forward(Err(e)),
            Ok(None) => self.connection_lost(ConsoleError::transport("agent stream closed by peer")),
            Err(e) => self.connection_lost(e),
        }
    }

    fn forward(&self, decoded: Result<StreamEvent>) {
        match decoded {
            Ok(event) => {
                log::trace!("Stream event: {}", event.kind());
                let _ = self.outputs.events.send(Ok(event));
            }
            Err(e) => {
                log::warn!("Dropping malformed stream payload: {e}");
                let _ = self.outputs.events.send(Err(e));
            }
        }
    }

    fn connection_lost(&mut self, error: ConsoleError) {
        self.socket = None;
        self.keepalive = None;
        log::warn!("Agent stream lost: {error}");
        self.transition(ConnectionStatus::Closed, self.state.retry_count);
        let _ = self.outputs.events.send(Err(error));
        self.schedule_reconnect();
    }

    async fn ping(&mut self) {
        let Some(socket) = self.socket.as_mut() else {
            return;
        };
        if let Err(e) = socket.send(PING_PAYLOAD.to_string()).await {
            self.connection_lost(e);
        }
    }

    async fn shutdown(&mut self) {
        self.timer.cancel();
        self.keepalive = None;
        if let Some(mut socket) = self.socket.take() {
            if let Err(e) = socket.close().await {
                log::debug!("Error closing agent stream: {e}");
            }
        }
        self.transition(ConnectionStatus::Closed, 0);
        log::info!("Agent stream closed");
    }

    /// Publish a new snapshot when it differs from the current one
    fn transition(&mut self, status: ConnectionStatus, retry_count: u32) {
        let next = Connection {
            status,
            retry_count,
        };
        if next == self.state {
            return;
        }
        log::debug!("Connection {} -> {} (retry {retry_count})", self.state.status, status);
        self.state = next;
        self.outputs.snapshot.send_replace(next);
        let _ = self.outputs.status.send(next);
    }
}

async fn next_frame<S: EventSocket>(socket: &mut Option<S>) -> Result<Option<String>> {
    match socket {
        Some(socket) => socket.recv().await,
        None => std::future::pending().await,
    }
}

async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
