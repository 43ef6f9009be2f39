//! Controller task: the only writer of the session view
//!
//! Stream events, caller requests and command outcomes all arrive on this
//! task's `select!` loop, so a command response and a stream event are never
//! applied concurrently.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use super::commands::{CommandOutcome, ControllerCommand, OutcomeResult, PendingCommand};
use super::model::Session;
use crate::command::{CommandChannel, CommandKind};
use crate::error::{ConsoleError, Result};
use crate::transport::connection::EventReceiver;
use crate::types::events::StreamEvent;
use crate::types::identifiers::{CommandId, TaskId};
use crate::types::options::ConsoleOptions;
use crate::types::session::LogLevel;
use crate::types::task::{StartRequest, TaskRequest, UploadFile, UploadedDocument};

pub(super) struct ControllerTask<C: CommandChannel> {
    channel: Arc<C>,
    options: ConsoleOptions,
    view: watch::Sender<Session>,
    pending: HashMap<CommandId, PendingCommand>,
    next_id: u64,
    staged_document: Option<UploadedDocument>,
    outcome_tx: mpsc::UnboundedSender<CommandOutcome>,
}

impl<C: CommandChannel> ControllerTask<C> {
    pub(super) fn new(
        channel: Arc<C>,
        options: ConsoleOptions,
        view: watch::Sender<Session>,
        outcome_tx: mpsc::UnboundedSender<CommandOutcome>,
    ) -> Self {
        Self {
            channel,
            options,
            view,
            pending: HashMap::new(),
            next_id: 0,
            staged_document: None,
            outcome_tx,
        }
    }

    pub(super) async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<ControllerCommand>,
        mut events: EventReceiver,
        mut outcomes: mpsc::UnboundedReceiver<CommandOutcome>,
    ) {
        let mut events_open = true;
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(ControllerCommand::Shutdown { reply }) => {
                        self.fail_pending(|| ConsoleError::closed("session controller"));
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                event = events.recv(), if events_open => match event {
                    Some(Ok(event)) => self.handle_event(event),
                    Some(Err(error)) => self.handle_stream_error(&error),
                    None => {
                        log::debug!("Event stream ended");
                        events_open = false;
                    }
                },
                Some(outcome) = outcomes.recv() => self.handle_outcome(outcome),
            }
        }
        log::debug!("Session controller exited");
    }

    // ------------------------------------------------------------------------
    // Requests
    // ------------------------------------------------------------------------

    fn handle_command(&mut self, command: ControllerCommand) {
        match command {
            ControllerCommand::Start { task, reply } => {
                if let Err(error) = self.check_start() {
                    log::warn!("{error}");
                    self.log(LogLevel::Warn, format!("Start rejected: {error}"));
                    let _ = reply.send(Err(error));
                    return;
                }
                let issued_revision = self.view.borrow().state_revision;
                let id = self.next_command_id();
                self.pending.insert(
                    id,
                    PendingCommand::Start {
                        issued_revision,
                        reply,
                    },
                );
                self.dispatch_start(id, task);
            }
            ControllerCommand::Lifecycle { kind, reply } => {
                let state = self.view.borrow().state;
                if !kind.expected_states().contains(&state) {
                    log::debug!("Sending {kind} while session is {state}");
                }
                let id = self.next_command_id();
                self.pending
                    .insert(id, PendingCommand::Lifecycle { kind, reply });
                self.dispatch_lifecycle(id, kind);
            }
            ControllerCommand::Upload { file, reply } => {
                let id = self.next_command_id();
                self.pending.insert(id, PendingCommand::Upload { reply });
                self.dispatch_upload(id, file);
            }
            ControllerCommand::Shutdown { reply } => {
                let _ = reply.send(());
            }
        }
    }

    fn check_start(&self) -> Result<()> {
        let state = self.view.borrow().state;
        let start_in_flight = self
            .pending
            .values()
            .any(|pending| matches!(pending, PendingCommand::Start { .. }));
        if start_in_flight {
            return Err(ConsoleError::StartInFlight);
        }
        if !state.can_start() {
            return Err(ConsoleError::invalid_state("start", state));
        }
        Ok(())
    }

    fn dispatch_start(&self, id: CommandId, task: TaskRequest) {
        let request = StartRequest::resolve(task, &self.options, self.staged_document.as_ref());
        log::info!("Starting task with model {}", request.model);
        let channel = Arc::clone(&self.channel);
        self.dispatch(
            id,
            CommandKind::Start,
            async move { channel.start(&request).await },
            OutcomeResult::Start,
        );
    }

    fn dispatch_lifecycle(&self, id: CommandId, kind: CommandKind) {
        let channel = Arc::clone(&self.channel);
        self.dispatch(
            id,
            kind,
            async move {
                match kind {
                    CommandKind::Pause => channel.pause().await,
                    CommandKind::Resume => channel.resume().await,
                    CommandKind::Stop => channel.stop().await,
                    CommandKind::Start | CommandKind::Upload => Err(ConsoleError::invalid_config(
                        format!("{kind} is not a lifecycle command"),
                    )),
                }
            },
            OutcomeResult::Lifecycle,
        );
    }

    fn dispatch_upload(&self, id: CommandId, file: UploadFile) {
        log::info!("Uploading {} ({} bytes)", file.filename, file.bytes.len());
        let channel = Arc::clone(&self.channel);
        self.dispatch(
            id,
            CommandKind::Upload,
            async move { channel.upload(file).await },
            OutcomeResult::Upload,
        );
    }

    /// Run a command channel call on its own task under the command timeout
    fn dispatch<T, F, W>(&self, id: CommandId, kind: CommandKind, call: F, wrap: W)
    where
        T: Send + 'static,
        F: Future<Output = Result<T>> + Send + 'static,
        W: FnOnce(Result<T>) -> OutcomeResult + Send + 'static,
    {
        let timeout = self.options.command_timeout;
        let outcomes = self.outcome_tx.clone();
        tokio::spawn(async move {
            let result = match tokio::time::timeout(timeout, call).await {
                Ok(result) => result,
                Err(_) => Err(ConsoleError::timeout(format!(
                    "{kind} did not complete within {timeout:?}"
                ))),
            };
            let _ = outcomes.send(CommandOutcome {
                id,
                result: wrap(result),
            });
        });
    }

    // ------------------------------------------------------------------------
    // Stream
    // ------------------------------------------------------------------------

    fn handle_event(&mut self, event: StreamEvent) {
        let agent_error = match &event {
            StreamEvent::Error { message } => Some(
                message
                    .clone()
                    .unwrap_or_else(|| "agent reported an error".to_string()),
            ),
            _ => None,
        };

        self.view.send_if_modified(|session| session.apply_event(event));

        if let Some(message) = agent_error {
            log::error!("Agent error: {message}");
            self.fail_pending(|| ConsoleError::agent(message.clone()));
        }
    }

    fn handle_stream_error(&mut self, error: &ConsoleError) {
        if error.is_protocol() {
            log::debug!("Stream payload dropped: {error}");
        } else {
            log::warn!("Stream notification: {error}");
        }
        self.view
            .send_modify(|session| session.record_stream_error(error));
    }

    // ------------------------------------------------------------------------
    // Outcomes
    // ------------------------------------------------------------------------

    fn handle_outcome(&mut self, outcome: CommandOutcome) {
        let Some(pending) = self.pending.remove(&outcome.id) else {
            log::debug!("Ignoring late response for {}", outcome.id);
            return;
        };

        match (pending, outcome.result) {
            (
                PendingCommand::Start {
                    issued_revision,
                    reply,
                },
                OutcomeResult::Start(result),
            ) => match result {
                Ok(ack) => {
                    self.staged_document = None;
                    self.view
                        .send_modify(|session| session.acknowledge_start(ack, issued_revision));
                    let task_id: Option<TaskId> = self.view.borrow().task_id.clone();
                    let _ = reply.send(Ok(task_id));
                }
                Err(error) => {
                    log::error!("Start failed: {error}");
                    self.log(LogLevel::Error, format!("Start failed: {error}"));
                    let _ = reply.send(Err(error));
                }
            },
            (PendingCommand::Lifecycle { kind, reply }, OutcomeResult::Lifecycle(result)) => {
                match result {
                    Ok(()) => {
                        log::info!("{kind} accepted");
                        self.log(LogLevel::Info, requested_message(kind));
                        let _ = reply.send(Ok(()));
                    }
                    Err(error) => {
                        log::warn!("{kind} rejected: {error}");
                        self.log(LogLevel::Warn, format!("{} rejected: {error}", title(kind)));
                        let _ = reply.send(Err(error));
                    }
                }
            }
            (PendingCommand::Upload { reply }, OutcomeResult::Upload(result)) => match result {
                Ok(document) => {
                    log::info!("Staged {} for the next task", document.filename);
                    self.log(
                        LogLevel::Info,
                        format!("Uploaded {} ({} chars)", document.filename, document.text_content.len()),
                    );
                    self.staged_document = Some(document.clone());
                    let _ = reply.send(Ok(document));
                }
                Err(error) => {
                    log::warn!("Upload failed: {error}");
                    self.log(LogLevel::Warn, format!("Upload failed: {error}"));
                    let _ = reply.send(Err(error));
                }
            },
            (pending, _) => {
                log::error!("Mismatched outcome for {} ({})", outcome.id, pending.kind());
            }
        }
    }

    /// Fail every in-flight command; their late outcomes are ignored
    fn fail_pending(&mut self, make_error: impl Fn() -> ConsoleError) {
        for (id, pending) in self.pending.drain() {
            log::debug!("Failing in-flight {} ({id})", pending.kind());
            match pending {
                PendingCommand::Start { reply, .. } => {
                    let _ = reply.send(Err(make_error()));
                }
                PendingCommand::Lifecycle { reply, .. } => {
                    let _ = reply.send(Err(make_error()));
                }
                PendingCommand::Upload { reply } => {
                    let _ = reply.send(Err(make_error()));
                }
            }
        }
    }

    fn log(&self, level: LogLevel, message: String) {
        self.view.send_modify(|session| session.push_log(level, message));
    }

    fn next_command_id(&mut self) -> CommandId {
        self.next_id += 1;
        CommandId::new(self.next_id)
    }
}

fn title(kind: CommandKind) -> &'static str {
    match kind {
        CommandKind::Start => "Start",
        CommandKind::Pause => "Pause",
        CommandKind::Resume => "Resume",
        CommandKind::Stop => "Stop",
        CommandKind::Upload => "Upload",
    }
}

fn requested_message(kind: CommandKind) -> String {
    format!("{} requested", title(kind))
}
