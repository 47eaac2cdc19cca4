//! Client events and actions.

use std::time::Duration;

use tidings_core::{ConnectionState, Generation, TimerId, TransportEvent};
use tidings_proto::InboundEvent;

use crate::diagnostic::Diagnostic;

/// Events the caller feeds into the client.
///
/// The caller is responsible for:
/// - Forwarding transport events tagged with the transport's generation
/// - Reporting expired timers
/// - Forwarding user intents (send, retry, select, mark read)
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// Begin connecting.
    Start,

    /// Stop the session.
    Stop,

    /// Drop the current connection and reconnect with a fresh attempt count.
    ForceReconnect,

    /// Event from a transport opened by [`ClientAction::Open`].
    Transport {
        /// Generation from the `Open` action
        generation: Generation,
        /// What happened
        event: TransportEvent,
    },

    /// Timer armed by [`ClientAction::ScheduleTimer`] expired.
    TimerFired(TimerId),

    /// User sends a text message.
    SendMessage {
        /// Target conversation
        conversation_id: String,
        /// Message body
        content: String,
    },

    /// User retries a failed message.
    Retry {
        /// The failed message
        message_id: String,
    },

    /// User switches conversation, or clears the selection.
    SelectConversation {
        /// Conversation to make active
        conversation_id: Option<String>,
    },

    /// User has read a conversation.
    MarkRead {
        /// Conversation to reset
        conversation_id: String,
    },

    /// Data obtained outside the live connection (e.g. a REST history page).
    Ingest(InboundEvent),
}

/// Actions the client produces for the caller to execute.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientAction {
    /// Open a transport to `url` and tag its events with `generation`.
    Open {
        /// Transport identity
        generation: Generation,
        /// Endpoint including query credentials
        url: String,
    },

    /// Write a text frame to the transport `generation`.
    Transmit {
        /// Transport identity
        generation: Generation,
        /// Encoded envelope
        text: String,
    },

    /// Close the transport `generation`.
    CloseTransport {
        /// Transport identity
        generation: Generation,
    },

    /// Arm a timer; report it back as [`ClientEvent::TimerFired`].
    ScheduleTimer {
        /// Timer identity
        timer: TimerId,
        /// Delay until it fires
        delay: Duration,
    },

    /// Disarm a timer.
    CancelTimer {
        /// Timer identity
        timer: TimerId,
    },

    /// Connection state was replaced.
    StateChanged(ConnectionState),

    /// Snapshot-visible state changed; take a new [`crate::ChatSnapshot`].
    SnapshotChanged,

    /// Non-fatal condition for subscribers and logs.
    Report(Diagnostic),
}
