//! Reconnect policy for the agent stream

use std::time::Duration;

/// Interval of the default fixed policy
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(3);

/// Upper bound on a single connect attempt
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Text sent as a keepalive ping
pub(super) const PING_PAYLOAD: &str = r#"{"type":"ping"}"#;

/// Capacity of the connection transition broadcast
pub(super) const STATUS_CHANNEL_CAPACITY: usize = 32;

/// When and how often the connection manager retries after a loss
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectPolicy {
    /// Retry at a fixed interval
    Fixed {
        /// Delay before each attempt
        interval: Duration,
        /// Attempts before giving up; `None` retries forever
        max_attempts: Option<u32>,
    },
    /// Retry with a doubling delay
    Exponential {
        /// Delay before the first attempt
        base: Duration,
        /// Upper bound on any single delay
        max_delay: Duration,
        /// Attempts before giving up
        max_attempts: u32,
    },
    /// Never reconnect
    Disabled,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::Fixed {
            interval: DEFAULT_RECONNECT_INTERVAL,
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    /// Exponential policy starting at 1 s, capped at 10 s, 5 attempts
    #[must_use]
    pub const fn exponential() -> Self {
        Self::Exponential {
            base: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            max_attempts: 5,
        }
    }

    /// Delay before reconnect attempt number `attempt` (1-based)
    ///
    /// Returns `None` once the policy is exhausted.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        match *self {
            Self::Fixed {
                interval,
                max_attempts,
            } => match max_attempts {
                Some(max) if attempt > max => None,
                _ => Some(interval),
            },
            Self::Exponential {
                base,
                max_delay,
                max_attempts,
            } => {
                if attempt > max_attempts {
                    return None;
                }
                let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
                Some(base.saturating_mul(factor).min(max_delay))
            }
            Self::Disabled => None,
        }
    }
}
