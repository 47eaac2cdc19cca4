//! Error types for the Tidings session core.
//!
//! Strongly-typed errors for different layers: connection errors (invalid
//! lifecycle operations, sends while offline), transport errors (network
//! failures) and configuration errors. Conditions the manager absorbs rather
//! than returns are reported as [`ConnectionDiagnostic`]s.

use thiserror::Error;
use tidings_proto::{DecodeError, EncodeError};

use crate::connection::{ConnectionPhase, Generation, TimerId};

/// Errors returned synchronously by [`crate::ConnectionManager`] operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// Operation not valid in the current phase
    #[error("invalid state transition: cannot {operation} from {state:?}")]
    InvalidState {
        /// Phase when the operation was attempted
        state: ConnectionPhase,
        /// Operation that was attempted
        operation: String,
    },

    /// Send gate rejected an outbound command
    #[error("not connected: send rejected while {phase:?}")]
    NotConnected {
        /// Phase when the send was attempted
        phase: ConnectionPhase,
    },

    /// Outbound command could not be serialized
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// Failures reported by a transport implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Connection could not be established
    #[error("connection failed: {0}")]
    Connect(String),

    /// Read or write failed on an established connection
    #[error("I/O error: {0}")]
    Io(String),

    /// Peer violated the framing protocol (e.g. binary frame, bad UTF-8)
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl TransportError {
    /// Returns true if this error is transient and may succeed on retry.
    ///
    /// Network failures are transient. Protocol violations indicate a broken
    /// peer and will likely repeat.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connect(_) | Self::Io(_))
    }
}

/// Invalid session configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// `user_id` is empty
    #[error("user id must not be empty")]
    MissingUserId,

    /// Automatic reconnects enabled with a zero interval
    #[error("reconnect interval must be non-zero when auto-reconnect is enabled")]
    ZeroInterval,

    /// Endpoint is not a valid URL
    #[error("invalid endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint {
        /// Configured endpoint
        endpoint: String,
        /// Parser message
        reason: String,
    },

    /// Endpoint scheme is not `ws` or `wss`
    #[error("unsupported endpoint scheme: {0}")]
    UnsupportedScheme(String),
}

/// Non-fatal conditions observed by the connection manager.
///
/// These never escape as errors: transport and decode failures turn into
/// state transitions or dropped frames, and are surfaced here so consumers
/// can log or display them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionDiagnostic {
    /// Transport reported a failure on the live connection
    #[error("transport failure on connection {generation}: {error}")]
    Transport {
        /// Connection that failed
        generation: Generation,
        /// What went wrong
        error: TransportError,
    },

    /// Inbound frame was dropped because it could not be decoded
    #[error("dropped inbound frame: {0}")]
    Decode(DecodeError),

    /// Inbound envelope with an unknown `type`
    #[error("ignored inbound envelope of unrecognized type {kind:?}")]
    Unrecognized {
        /// The unknown `type`
        kind: String,
    },

    /// Event from a superseded connection was discarded
    #[error("discarded event from stale connection {generation} (live: {live:?})")]
    StaleEvent {
        /// Connection the event came from
        generation: Generation,
        /// Connection currently owned by the manager
        live: Option<Generation>,
    },

    /// Timer that is no longer armed fired
    #[error("discarded stale timer {timer}")]
    StaleTimer {
        /// The timer
        timer: TimerId,
    },

    /// Reconnect attempts used up; the session is closed
    #[error("reconnect attempts exhausted after {attempts} attempts")]
    ReconnectExhausted {
        /// Attempts made since the last successful connection
        attempts: u32,
    },

    /// The identification command could not be serialized
    #[error("failed to send init: {0}")]
    Encode(EncodeError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_errors_are_transient() {
        assert!(TransportError::Connect("refused".to_string()).is_transient());
        assert!(TransportError::Io("reset".to_string()).is_transient());
    }

    #[test]
    fn protocol_violations_are_not_transient() {
        assert!(!TransportError::Protocol("binary frame".to_string()).is_transient());
    }

    #[test]
    fn invalid_state_names_operation_and_phase() {
        let err = ConnectionError::InvalidState {
            state: ConnectionPhase::Closed,
            operation: "start".to_string(),
        };
        assert_eq!(err.to_string(), "invalid state transition: cannot start from Closed");
    }
}
