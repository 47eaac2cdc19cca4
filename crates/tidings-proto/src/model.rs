//! Chat data model.
//!
//! Field names follow the wire (camelCase JSON). Timestamps are RFC 3339
//! strings on the wire and [`DateTime<Utc>`] in memory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Free-form metadata attached to a message. Carried through untouched.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Delivery status of a message.
///
/// `Sending < Sent < Delivered < Read` is the forward order. `Failed` sits
/// outside that order: it is reachable from `Sending` only, and left only by
/// an explicit retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    /// Created locally, not yet confirmed by the server
    Sending,
    /// Accepted by the server
    Sent,
    /// Delivered to the recipient's device
    Delivered,
    /// Read by the recipient
    Read,
    /// Could not be sent
    Failed,
}

impl MessageStatus {
    /// Position in the forward order. `None` for [`MessageStatus::Failed`].
    pub fn rank(self) -> Option<u8> {
        match self {
            Self::Sending => Some(0),
            Self::Sent => Some(1),
            Self::Delivered => Some(2),
            Self::Read => Some(3),
            Self::Failed => None,
        }
    }

    /// Whether a server-driven update may move a message from `self` to
    /// `next`.
    ///
    /// Allowed: strictly forward along the order, or `Sending -> Failed`.
    /// Everything else (including same-status updates) is rejected.
    pub fn can_advance_to(self, next: Self) -> bool {
        match (self.rank(), next.rank()) {
            (Some(current), Some(next)) => next > current,
            (Some(0), None) => true,
            _ => false,
        }
    }

    /// Wire name of the status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sending => "sending",
            Self::Sent => "sent",
            Self::Delivered => "delivered",
            Self::Read => "read",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of message content. Immutable once the message exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Plain text
    #[default]
    Text,
    /// Image attachment
    Image,
    /// File attachment
    File,
    /// System notice (joins, renames, ...)
    System,
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Message identifier. Client-assigned for optimistic messages.
    pub id: String,
    /// Conversation the message belongs to
    pub conversation_id: String,
    /// Author's user ID
    pub sender_id: String,
    /// Message body
    pub content: String,
    /// Creation time
    pub timestamp: DateTime<Utc>,
    /// Delivery status
    pub status: MessageStatus,
    /// Content kind
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
    /// Optional application metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl Message {
    /// A new text message in [`MessageStatus::Sending`].
    pub fn text(
        id: impl Into<String>,
        conversation_id: impl Into<String>,
        sender_id: impl Into<String>,
        content: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            conversation_id: conversation_id.into(),
            sender_id: sender_id.into(),
            content: content.into(),
            timestamp,
            status: MessageStatus::Sending,
            kind: MessageKind::Text,
            metadata: None,
        }
    }

    /// Same message with a different status.
    #[must_use]
    pub fn with_status(mut self, status: MessageStatus) -> Self {
        self.status = status;
        self
    }
}

/// A chat participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatUser {
    /// User identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Avatar URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    /// Presence flag, if the server reports it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_online: Option<bool>,
    /// Last time the user was seen online
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
}

/// A conversation thread.
///
/// `last_message` and `updated_at` are server-provided when the list arrives
/// and are afterwards derived from the tail of the conversation's log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// Conversation identifier
    pub id: String,
    /// Display title
    #[serde(default)]
    pub title: String,
    /// Members of the conversation
    #[serde(default)]
    pub participants: Vec<ChatUser>,
    /// Most recent message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<Message>,
    /// Messages received while the conversation was not active
    #[serde(default)]
    pub unread_count: u32,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Time of the most recent activity
    pub updated_at: DateTime<Utc>,
    /// Group conversation (more than two participants)
    #[serde(default)]
    pub is_group: bool,
    /// Avatar URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [MessageStatus; 5] = [
        MessageStatus::Sending,
        MessageStatus::Sent,
        MessageStatus::Delivered,
        MessageStatus::Read,
        MessageStatus::Failed,
    ];

    #[test]
    fn forward_transitions_are_allowed() {
        assert!(MessageStatus::Sending.can_advance_to(MessageStatus::Sent));
        assert!(MessageStatus::Sending.can_advance_to(MessageStatus::Read));
        assert!(MessageStatus::Sent.can_advance_to(MessageStatus::Delivered));
        assert!(MessageStatus::Delivered.can_advance_to(MessageStatus::Read));
    }

    #[test]
    fn backward_and_same_transitions_are_rejected() {
        assert!(!MessageStatus::Read.can_advance_to(MessageStatus::Sent));
        assert!(!MessageStatus::Delivered.can_advance_to(MessageStatus::Sent));
        for status in ALL {
            assert!(!status.can_advance_to(status), "{status} -> {status}");
        }
    }

    #[test]
    fn failed_only_from_sending() {
        for status in ALL {
            let allowed = status.can_advance_to(MessageStatus::Failed);
            assert_eq!(allowed, status == MessageStatus::Sending, "{status} -> failed");
        }
    }

    #[test]
    fn failed_is_not_left_by_server_updates() {
        for status in ALL {
            assert!(!MessageStatus::Failed.can_advance_to(status));
        }
    }

    #[test]
    fn message_uses_wire_field_names() {
        let timestamp = DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let message = Message::text("m1", "conv-1", "u1", "hi", timestamp);

        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["conversationId"], "conv-1");
        assert_eq!(value["senderId"], "u1");
        assert_eq!(value["type"], "text");
        assert_eq!(value["status"], "sending");
        assert!(value.get("metadata").is_none());
    }

    #[test]
    fn conversation_defaults_optional_fields() {
        let json = r#"{
            "id": "c1",
            "createdAt": "2024-05-01T10:00:00Z",
            "updatedAt": "2024-05-01T10:00:00Z"
        }"#;

        let conversation: Conversation = serde_json::from_str(json).unwrap();
        assert_eq!(conversation.unread_count, 0);
        assert!(conversation.participants.is_empty());
        assert!(conversation.last_message.is_none());
        assert!(!conversation.is_group);
    }
}
