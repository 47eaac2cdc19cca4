//! Server-side values for tests.
//!
//! Timestamps are fixed offsets from [`SIM_EPOCH_MILLIS`] so fixtures built
//! in different tests compare equal.

use chrono::{DateTime, Utc};
use tidings_client::ClientConfig;
use tidings_proto::{ChatUser, Conversation, Message, MessageStatus};

use crate::sim_env::SIM_EPOCH_MILLIS;

/// Endpoint used by [`config`].
pub const ENDPOINT: &str = "ws://chat.test/ws";

/// User the session under test signs in as.
pub const USER_ID: &str = "u1";

/// Session config for [`USER_ID`] with default reconnect settings.
pub fn config() -> ClientConfig {
    ClientConfig::new(ENDPOINT, USER_ID)
}

/// `SIM_EPOCH_MILLIS + offset_millis` as a timestamp.
pub fn at(offset_millis: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(SIM_EPOCH_MILLIS + offset_millis).unwrap_or_default()
}

/// A text message as the server sends it: status `sent`.
pub fn message(id: &str, conversation_id: &str, sender_id: &str, content: &str) -> Message {
    Message::text(id, conversation_id, sender_id, content, at(0)).with_status(MessageStatus::Sent)
}

/// A one-to-one conversation between [`USER_ID`] and `peer`.
pub fn conversation(id: &str, peer: &str) -> Conversation {
    Conversation {
        id: id.to_string(),
        title: peer.to_string(),
        participants: vec![user(USER_ID), user(peer)],
        last_message: None,
        unread_count: 0,
        created_at: at(-60_000),
        updated_at: at(-60_000),
        is_group: false,
        avatar: None,
    }
}

/// A participant with no presence information.
pub fn user(id: &str) -> ChatUser {
    ChatUser {
        id: id.to_string(),
        name: id.to_uppercase(),
        avatar: None,
        is_online: None,
        last_seen: None,
    }
}
