//! Reconnect policy.
//!
//! Pure function of the attempt counter: no clock, no timers. The connection
//! manager asks for a decision each time a connection is lost and arms a
//! timer for the returned delay.

use std::time::Duration;

use crate::config::ClientConfig;

/// What to do after a connection loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffDecision {
    /// Try again after `delay`. `attempt` is 1-based.
    Retry {
        /// Number of the attempt about to be scheduled
        attempt: u32,
        /// Delay before the attempt
        delay: Duration,
    },
    /// Stop reconnecting.
    GiveUp,
}

/// Fixed-interval reconnect policy bounded by a maximum attempt count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    enabled: bool,
    interval: Duration,
    max_attempts: u32,
}

impl Backoff {
    /// Policy with explicit parameters.
    pub fn new(enabled: bool, interval: Duration, max_attempts: u32) -> Self {
        Self { enabled, interval, max_attempts }
    }

    /// Policy described by a session configuration.
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.auto_reconnect, config.reconnect_interval, config.max_reconnect_attempts)
    }

    /// Decide after a loss, given how many reconnect attempts have already
    /// been made since the last successful connection.
    pub fn next(&self, attempts_made: u32) -> BackoffDecision {
        if !self.enabled || attempts_made >= self.max_attempts {
            return BackoffDecision::GiveUp;
        }

        BackoffDecision::Retry { attempt: attempts_made + 1, delay: self.interval }
    }

    /// Whether reconnects are enabled at all.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Upper bound on consecutive attempts.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}
