//! Session controller
//!
//! The controller owns the [`Session`] view model. It sends lifecycle
//! commands over a [`CommandChannel`](crate::command::CommandChannel),
//! applies decoded stream events in arrival order, and publishes every change
//! through a `watch` channel.
//!
//! The stream is authoritative. A command response only says the backend
//! accepted the request; the one exception is an accepted `start`, which
//! moves the session to Running optimistically when no stream state has
//! arrived since the command was sent. The next state-bearing event confirms
//! or overrides it.

mod commands;
mod controller;
mod model;
mod tasks;

use tokio::sync::{mpsc, watch};

pub use model::Session;

/// Handle to a running session controller
///
/// Cheap to clone; every clone talks to the same task.
#[derive(Clone)]
pub struct SessionController {
    commands: mpsc::UnboundedSender<commands::ControllerCommand>,
    view: watch::Receiver<Session>,
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let session = self.view.borrow();
        f.debug_struct("SessionController")
            .field("state", &session.state)
            .field("task_id", &session.task_id)
            .field("running", &!self.commands.is_closed())
            .finish()
    }
}
