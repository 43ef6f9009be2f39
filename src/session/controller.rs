//! Public handle of the session controller

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};

use super::SessionController;
use super::commands::ControllerCommand;
use super::model::Session;
use super::tasks::ControllerTask;
use crate::command::{CommandChannel, CommandKind};
use crate::error::{ConsoleError, Result};
use crate::transport::connection::EventReceiver;
use crate::types::identifiers::TaskId;
use crate::types::options::ConsoleOptions;
use crate::types::task::{TaskRequest, UploadFile, UploadedDocument};

impl SessionController {
    /// Spawn the controller task
    ///
    /// `events` is the receiver taken from the connection manager. Must be
    /// called from within a tokio runtime.
    pub fn spawn<C: CommandChannel>(
        channel: C,
        events: EventReceiver,
        options: &ConsoleOptions,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(Session::new());

        let task = ControllerTask::new(Arc::new(channel), options.clone(), view_tx, outcome_tx);
        tokio::spawn(task.run(command_rx, events, outcome_rx));

        Self {
            commands: command_tx,
            view: view_rx,
        }
    }

    /// Start a task
    ///
    /// Rejected locally, without contacting the backend, unless the session
    /// is Idle, Completed or Error and no other start is in flight.
    ///
    /// # Returns
    /// The task ID, when known once the backend accepted the task
    ///
    /// # Errors
    /// Returns `ConsoleError::InvalidState` or `ConsoleError::StartInFlight`
    /// for a local rejection, or the
    /// command error when the backend rejects or does not answer in time
    pub async fn start(&self, task: TaskRequest) -> Result<Option<TaskId>> {
        self.request(|reply| ControllerCommand::Start { task, reply })
            .await
    }

    /// Ask the backend to pause
    ///
    /// # Errors
    /// Returns the command error when the backend rejects the request
    pub async fn pause(&self) -> Result<()> {
        self.lifecycle(CommandKind::Pause).await
    }

    /// Ask the backend to resume
    ///
    /// # Errors
    /// Returns the command error when the backend rejects the request
    pub async fn resume(&self) -> Result<()> {
        self.lifecycle(CommandKind::Resume).await
    }

    /// Ask the backend to stop
    ///
    /// # Errors
    /// Returns the command error when the backend rejects the request
    pub async fn stop(&self) -> Result<()> {
        self.lifecycle(CommandKind::Stop).await
    }

    /// Upload a file and stage it as context for the next start
    ///
    /// # Errors
    /// Returns the command error when the upload fails
    pub async fn upload(&self, file: UploadFile) -> Result<UploadedDocument> {
        self.request(|reply| ControllerCommand::Upload { file, reply })
            .await
    }

    /// Subscribe to session snapshots
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.view.clone()
    }

    /// Current session snapshot
    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.view.borrow().clone()
    }

    /// Stop the controller task
    ///
    /// In-flight commands fail with `ConsoleError::Closed`.
    ///
    /// # Errors
    /// Returns `ConsoleError::Closed` if the task already exited
    pub async fn shutdown(&self) -> Result<()> {
        let (reply, reply_rx) = oneshot::channel();
        self.commands
            .send(ControllerCommand::Shutdown { reply })
            .map_err(|_| ConsoleError::closed("session controller"))?;
        reply_rx
            .await
            .map_err(|_| ConsoleError::closed("session controller"))
    }

    /// Whether the controller task is still running
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }

    async fn lifecycle(&self, kind: CommandKind) -> Result<()> {
        self.request(|reply| ControllerCommand::Lifecycle { kind, reply })
            .await
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T>>) -> ControllerCommand,
    ) -> Result<T> {
        let (reply, reply_rx) = oneshot::channel();
        self.commands
            .send(build(reply))
            .map_err(|_| ConsoleError::closed("session controller"))?;
        reply_rx
            .await
            .map_err(|_| ConsoleError::closed("session controller"))?
    }
}
