//! Single-slot cancelable reconnect timer

use std::pin::Pin;
use std::time::Duration;

use tokio::time::{Instant, Sleep};

/// Owned reconnect timer; at most one deadline is armed at a time
#[derive(Debug, Default)]
pub struct ReconnectTimer {
    sleep: Option<Pin<Box<Sleep>>>,
}

impl ReconnectTimer {
    /// Create an idle timer
    #[must_use]
    pub const fn new() -> Self {
        Self { sleep: None }
    }

    /// Arm the timer to fire after `delay`
    ///
    /// Returns `false` and leaves the existing deadline untouched when a
    /// timer is already pending.
    pub fn schedule(&mut self, delay: Duration) -> bool {
        if self.sleep.is_some() {
            return false;
        }
        self.sleep = Some(Box::pin(tokio::time::sleep(delay)));
        true
    }

    /// Disarm the timer
    ///
    /// Returns whether a timer was pending.
    pub fn cancel(&mut self) -> bool {
        self.sleep.take().is_some()
    }

    /// Whether a deadline is armed
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.sleep.is_some()
    }

    /// Deadline of the armed timer
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.sleep.as_ref().map(|sleep| sleep.deadline())
    }

    /// Wait for the armed deadline, then disarm
    ///
    /// Never resolves while the timer is idle, so it can sit in a
    /// `tokio::select!` branch unconditionally.
    pub async fn fired(&mut self) {
        match self.sleep.as_mut() {
            Some(sleep) => {
                sleep.as_mut().await;
                self.sleep = None;
            }
            None => std::future::pending::<()>().await,
        }
    }
}
