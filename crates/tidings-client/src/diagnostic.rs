//! Non-fatal session conditions.

use thiserror::Error;
use tidings_core::{ConnectionDiagnostic, ConnectionPhase, Generation, TransportError};
use tidings_proto::MessageStatus;

/// Why a `message_status` update was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusRejection {
    /// No message with that ID is known
    UnknownMessage,
    /// Update would move the status backwards or sideways
    NotMonotonic {
        /// Status the message has
        current: MessageStatus,
        /// Status the server asked for
        requested: MessageStatus,
    },
}

/// Something the session absorbed instead of failing.
///
/// Delivered to subscribers and logged by the runtime. None of these change
/// connection state on their own.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// Condition reported by the connection manager
    #[error(transparent)]
    Connection(#[from] ConnectionDiagnostic),

    /// Optimistic message recorded, but not written because the send gate
    /// was closed. It stays `sending`.
    #[error("message {message_id} not sent: connection is {phase:?}")]
    SendDeferred {
        /// The optimistic message
        message_id: String,
        /// Connection phase at the time
        phase: ConnectionPhase,
    },

    /// A `message_status` update was ignored
    #[error("ignored status {status} for message {message_id}: {reason:?}")]
    StatusIgnored {
        /// Target message
        message_id: String,
        /// Requested status
        status: MessageStatus,
        /// Why it was ignored
        reason: StatusRejection,
    },

    /// A message arrived under an ID already used in another conversation
    #[error("ignored message {message_id}: id already used in conversation {existing}")]
    ConflictingMessage {
        /// The message ID
        message_id: String,
        /// Conversation that owns the ID
        existing: String,
    },

    /// An outbound frame could not be handed to the live connection, because
    /// its queue was full or the connection had already ended
    #[error("dropped outbound frame on connection {generation}: {error}")]
    FrameDropped {
        /// Connection the frame was meant for
        generation: Generation,
        /// Why the hand-off failed
        error: TransportError,
    },
}

impl Diagnostic {
    /// Whether this indicates a real failure rather than routine noise such
    /// as stale events or duplicate updates.
    pub fn is_failure(&self) -> bool {
        match self {
            Self::Connection(
                ConnectionDiagnostic::Transport { .. }
                | ConnectionDiagnostic::Decode(_)
                | ConnectionDiagnostic::ReconnectExhausted { .. }
                | ConnectionDiagnostic::Encode(_),
            )
            | Self::ConflictingMessage { .. }
            | Self::FrameDropped { .. } => true,
            Self::Connection(
                ConnectionDiagnostic::Unrecognized { .. }
                | ConnectionDiagnostic::StaleEvent { .. }
                | ConnectionDiagnostic::StaleTimer { .. },
            )
            | Self::SendDeferred { .. }
            | Self::StatusIgnored { .. } => false,
        }
    }
}
