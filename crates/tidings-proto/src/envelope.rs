//! JSON envelope codec.
//!
//! Frames are JSON objects tagged by `type`. Decoding happens in two steps:
//! the discriminator is read first, then the payload is parsed against the
//! shape for that `type`. This separates "not JSON" and "no tag" from "known
//! tag, wrong shape" and lets unknown tags through as
//! [`InboundEvent::Unrecognized`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    errors::{DecodeError, EncodeError},
    model::{Conversation, Message, MessageStatus},
};

/// Commands the client sends to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundCommand {
    /// Identify the session. Sent once per successful connection.
    Init {
        /// Caller's user ID
        #[serde(rename = "userId")]
        user_id: String,
    },

    /// Submit a message.
    SendMessage {
        /// The message, as created locally
        message: Message,
    },
}

impl OutboundCommand {
    /// Envelope `type` of this command.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Init { .. } => "init",
            Self::SendMessage { .. } => "send_message",
        }
    }

    /// Serialize to a JSON text frame.
    pub fn encode(&self) -> Result<String, EncodeError> {
        serde_json::to_string(self)
            .map_err(|e| EncodeError { kind: self.kind().to_string(), reason: e.to_string() })
    }

    /// Parse a JSON text frame. Used by servers and test peers.
    pub fn decode(raw: &str) -> Result<Self, DecodeError> {
        let (kind, value) = split_envelope(raw)?;
        serde_json::from_value(value).map_err(|e| DecodeError::InvalidEnvelope {
            kind,
            reason: e.to_string(),
            raw: raw.to_string(),
        })
    }
}

/// Events the server pushes to the client.
///
/// Closed set: anything else decodes to [`InboundEvent::Unrecognized`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    /// Full conversation list. Replaces whatever the client holds.
    Conversations {
        /// All conversations visible to the user
        conversations: Vec<Conversation>,
    },

    /// A new message (someone else's, or the echo of our own).
    Message {
        /// The message
        message: Message,
    },

    /// Status change for an existing message.
    MessageStatus {
        /// Message being updated
        #[serde(rename = "messageId")]
        message_id: String,
        /// New status
        status: MessageStatus,
    },

    /// Older messages, oldest first.
    History {
        /// Batch of messages, possibly spanning conversations
        messages: Vec<Message>,
    },

    /// Envelope with a `type` this client does not understand.
    #[serde(skip)]
    Unrecognized {
        /// The unknown `type` value
        kind: String,
    },
}

const INBOUND_KINDS: [&str; 4] = ["conversations", "message", "message_status", "history"];

impl InboundEvent {
    /// Envelope `type` of this event.
    pub fn kind(&self) -> &str {
        match self {
            Self::Conversations { .. } => "conversations",
            Self::Message { .. } => "message",
            Self::MessageStatus { .. } => "message_status",
            Self::History { .. } => "history",
            Self::Unrecognized { kind } => kind,
        }
    }

    /// Parse a JSON text frame.
    ///
    /// # Errors
    ///
    /// - `DecodeError::Json` if the frame is not JSON
    /// - `DecodeError::MissingType` if there is no string `type` field
    /// - `DecodeError::InvalidEnvelope` if a known `type` has the wrong shape
    pub fn decode(raw: &str) -> Result<Self, DecodeError> {
        let (kind, value) = split_envelope(raw)?;

        if !INBOUND_KINDS.contains(&kind.as_str()) {
            return Ok(Self::Unrecognized { kind });
        }

        serde_json::from_value(value).map_err(|e| DecodeError::InvalidEnvelope {
            kind,
            reason: e.to_string(),
            raw: raw.to_string(),
        })
    }

    /// Serialize to a JSON text frame. Used by servers and test peers.
    ///
    /// An [`InboundEvent::Unrecognized`] encodes as a bare `{"type": kind}`.
    pub fn encode(&self) -> Result<String, EncodeError> {
        if let Self::Unrecognized { kind } = self {
            return Ok(serde_json::json!({ "type": kind }).to_string());
        }

        serde_json::to_string(self)
            .map_err(|e| EncodeError { kind: self.kind().to_string(), reason: e.to_string() })
    }
}

/// Parse the frame as JSON and pull out its `type` discriminator.
fn split_envelope(raw: &str) -> Result<(String, Value), DecodeError> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| DecodeError::Json { reason: e.to_string(), raw: raw.to_string() })?;

    let Some(kind) = value.get("type").and_then(Value::as_str) else {
        return Err(DecodeError::MissingType { raw: raw.to_string() });
    };

    Ok((kind.to_string(), value))
}
