//! Messages exchanged between the controller handle, its task and the
//! per-command worker tasks

use tokio::sync::oneshot;

use crate::command::{CommandKind, StartAck};
use crate::error::Result;
use crate::types::identifiers::{CommandId, TaskId};
use crate::types::task::{TaskRequest, UploadFile, UploadedDocument};

/// Requests from `SessionController` to its task
pub(super) enum ControllerCommand {
    Start {
        task: TaskRequest,
        reply: oneshot::Sender<Result<Option<TaskId>>>,
    },
    /// `pause`, `resume` or `stop`
    Lifecycle {
        kind: CommandKind,
        reply: oneshot::Sender<Result<()>>,
    },
    Upload {
        file: UploadFile,
        reply: oneshot::Sender<Result<UploadedDocument>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Caller waiting on an in-flight command
pub(super) enum PendingCommand {
    Start {
        issued_revision: u64,
        reply: oneshot::Sender<Result<Option<TaskId>>>,
    },
    Lifecycle {
        kind: CommandKind,
        reply: oneshot::Sender<Result<()>>,
    },
    Upload {
        reply: oneshot::Sender<Result<UploadedDocument>>,
    },
}

impl PendingCommand {
    pub(super) const fn kind(&self) -> CommandKind {
        match self {
            Self::Start { .. } => CommandKind::Start,
            Self::Lifecycle { kind, .. } => *kind,
            Self::Upload { .. } => CommandKind::Upload,
        }
    }
}

/// Result of a command channel call, fed back into the controller loop
pub(super) struct CommandOutcome {
    pub id: CommandId,
    pub result: OutcomeResult,
}

pub(super) enum OutcomeResult {
    Start(Result<StartAck>),
    Lifecycle(Result<()>),
    Upload(Result<UploadedDocument>),
}
