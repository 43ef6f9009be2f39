//! Shared fakes for integration tests
//!
//! `FakeChannel` stands in for the HTTP backend, `ScriptedConnector` and
//! `FakeRemote` for the WebSocket server.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use browser_agent_console::{
    CommandChannel, ConsoleError, Connector, EventSocket, Result, StartAck, StartRequest,
    UploadFile, UploadedDocument,
};
use tokio::sync::{Notify, mpsc};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ============================================================================
// Command channel
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Start(StartRequest),
    Pause,
    Resume,
    Stop,
    Upload(String),
}

#[derive(Default)]
struct ChannelState {
    calls: Mutex<Vec<Call>>,
    start_results: Mutex<VecDeque<Result<StartAck>>>,
    lifecycle_results: Mutex<VecDeque<Result<()>>>,
    upload_results: Mutex<VecDeque<Result<UploadedDocument>>>,
    start_gate: Mutex<Option<Arc<Notify>>>,
    delay: Mutex<Option<Duration>>,
}

/// Command channel that records calls and replays scripted results
#[derive(Clone, Default)]
pub struct FakeChannel {
    state: Arc<ChannelState>,
}

impl FakeChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.calls.lock().unwrap().clone()
    }

    pub fn start_calls(&self) -> Vec<StartRequest> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Start(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    pub fn push_start(&self, result: Result<StartAck>) {
        self.state.start_results.lock().unwrap().push_back(result);
    }

    pub fn push_lifecycle(&self, result: Result<()>) {
        self.state.lifecycle_results.lock().unwrap().push_back(result);
    }

    pub fn push_upload(&self, result: Result<UploadedDocument>) {
        self.state.upload_results.lock().unwrap().push_back(result);
    }

    /// Make every start wait until the returned handle is notified
    pub fn hold_starts(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.state.start_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    /// Delay every call by `delay`
    pub fn set_delay(&self, delay: Duration) {
        *self.state.delay.lock().unwrap() = Some(delay);
    }

    fn record(&self, call: Call) {
        self.state.calls.lock().unwrap().push(call);
    }

    async fn pause_for_delay(&self) {
        let delay = *self.state.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    async fn lifecycle(&self, call: Call) -> Result<()> {
        self.record(call);
        self.pause_for_delay().await;
        let scripted = self.state.lifecycle_results.lock().unwrap().pop_front();
        scripted.unwrap_or(Ok(()))
    }
}

pub fn ack(task_id: Option<&str>) -> StartAck {
    StartAck {
        status: Some("started".to_string()),
        task_id: task_id.map(Into::into),
    }
}

impl CommandChannel for FakeChannel {
    async fn start(&self, request: &StartRequest) -> Result<StartAck> {
        self.record(Call::Start(request.clone()));
        let gate = self.state.start_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.pause_for_delay().await;
        let scripted = self.state.start_results.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(ack(None)))
    }

    async fn pause(&self) -> Result<()> {
        self.lifecycle(Call::Pause).await
    }

    async fn resume(&self) -> Result<()> {
        self.lifecycle(Call::Resume).await
    }

    async fn stop(&self) -> Result<()> {
        self.lifecycle(Call::Stop).await
    }

    async fn upload(&self, file: UploadFile) -> Result<UploadedDocument> {
        self.record(Call::Upload(file.filename.clone()));
        self.pause_for_delay().await;
        let scripted = self.state.upload_results.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| {
            Ok(UploadedDocument {
                filename: file.filename,
                content_type: file.content_type,
                text_content: String::from_utf8_lossy(&file.bytes).into_owned(),
            })
        })
    }
}

// ============================================================================
// Stream
// ============================================================================

enum Frame {
    Text(String),
    Fail(String),
    Garbled(String),
}

/// Client end handed to the connection manager
pub struct FakeSocket {
    incoming: mpsc::UnboundedReceiver<Frame>,
    outgoing: mpsc::UnboundedSender<String>,
}

/// Server end driven by the test
pub struct FakeRemote {
    to_client: Option<mpsc::UnboundedSender<Frame>>,
    from_client: mpsc::UnboundedReceiver<String>,
}

pub fn socket_pair() -> (FakeSocket, FakeRemote) {
    let (to_client, incoming) = mpsc::unbounded_channel();
    let (outgoing, from_client) = mpsc::unbounded_channel();
    (
        FakeSocket { incoming, outgoing },
        FakeRemote {
            to_client: Some(to_client),
            from_client,
        },
    )
}

impl EventSocket for FakeSocket {
    async fn recv(&mut self) -> Result<Option<String>> {
        match self.incoming.recv().await {
            Some(Frame::Text(text)) => Ok(Some(text)),
            Some(Frame::Fail(message)) => Err(ConsoleError::transport(message)),
            Some(Frame::Garbled(message)) => Err(ConsoleError::protocol(message, None)),
            None => Ok(None),
        }
    }

    async fn send(&mut self, text: String) -> Result<()> {
        self.outgoing
            .send(text)
            .map_err(|_| ConsoleError::transport("remote gone"))
    }

    async fn close(&mut self) -> Result<()> {
        self.incoming.close();
        Ok(())
    }
}

impl FakeRemote {
    pub fn send_text(&self, text: impl Into<String>) {
        if let Some(tx) = &self.to_client {
            let _ = tx.send(Frame::Text(text.into()));
        }
    }

    pub fn send_json(&self, value: serde_json::Value) {
        self.send_text(value.to_string());
    }

    /// Break the socket with a read error
    pub fn fail(&self, message: &str) {
        if let Some(tx) = &self.to_client {
            let _ = tx.send(Frame::Fail(message.to_string()));
        }
    }

    /// Deliver a frame the socket cannot decode
    pub fn garble(&self, message: &str) {
        if let Some(tx) = &self.to_client {
            let _ = tx.send(Frame::Garbled(message.to_string()));
        }
    }

    /// Close the socket from the server side
    pub fn close(&mut self) {
        self.to_client = None;
    }

    /// Next text the client sent
    pub async fn next_sent(&mut self) -> Option<String> {
        self.from_client.recv().await
    }
}

enum Outcome {
    Accept(FakeSocket),
    Refuse(String),
    Stall,
}

#[derive(Default)]
struct ConnectorState {
    outcomes: Mutex<VecDeque<Outcome>>,
    connects: AtomicUsize,
}

/// Connector that replays a queue of accept/refuse outcomes
///
/// Once the queue is empty every attempt is refused.
#[derive(Clone, Default)]
pub struct ScriptedConnector {
    state: Arc<ConnectorState>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful connect and return the server end
    pub fn accept(&self) -> FakeRemote {
        let (socket, remote) = socket_pair();
        self.state
            .outcomes
            .lock()
            .unwrap()
            .push_back(Outcome::Accept(socket));
        remote
    }

    /// Queue a refused connect
    pub fn refuse(&self, message: &str) {
        self.state
            .outcomes
            .lock()
            .unwrap()
            .push_back(Outcome::Refuse(message.to_string()));
    }

    /// Queue a connect that never completes
    pub fn stall(&self) {
        self.state.outcomes.lock().unwrap().push_back(Outcome::Stall);
    }

    pub fn connect_count(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }
}

impl Connector for ScriptedConnector {
    type Socket = FakeSocket;

    async fn connect(&self) -> Result<FakeSocket> {
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        let outcome = self.state.outcomes.lock().unwrap().pop_front();
        match outcome {
            Some(Outcome::Accept(socket)) => Ok(socket),
            Some(Outcome::Refuse(message)) => Err(ConsoleError::transport(message)),
            Some(Outcome::Stall) => std::future::pending().await,
            None => Err(ConsoleError::transport("connection refused")),
        }
    }
}
