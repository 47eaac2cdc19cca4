//! Read-only session view.

use std::{collections::BTreeMap, sync::Arc};

use tidings_core::ConnectionState;
use tidings_proto::{Conversation, Message};

/// Owned view of everything a UI renders.
///
/// Taken after state changes and handed to consumers; mutating it has no
/// effect on the session. Message logs are shared with the session until
/// the session next changes them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatSnapshot {
    /// Connection state at the time of the snapshot
    pub connection: ConnectionState,
    /// Conversation list with derived summaries
    pub conversations: Vec<Conversation>,
    /// Message logs keyed by conversation ID, each in log order
    pub messages: BTreeMap<String, Arc<Vec<Message>>>,
    /// Conversation the user is looking at
    pub active_conversation: Option<String>,
    /// Waiting for the first conversation list
    pub is_loading: bool,
}

impl ChatSnapshot {
    /// Messages of one conversation. Empty if none are known.
    pub fn messages_in(&self, conversation_id: &str) -> &[Message] {
        self.messages.get(conversation_id).map_or(&[], |log| log.as_slice())
    }

    /// Messages of the active conversation.
    pub fn active_messages(&self) -> &[Message] {
        self.active_conversation.as_deref().map_or(&[], |id| self.messages_in(id))
    }

    /// Look up a conversation.
    pub fn conversation(&self, conversation_id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == conversation_id)
    }

    /// Look up a message in any conversation.
    pub fn message(&self, message_id: &str) -> Option<&Message> {
        self.all_messages().find(|m| m.id == message_id)
    }

    /// Every message, conversation by conversation.
    pub fn all_messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.values().flat_map(|log| log.iter())
    }

    /// Sum of unread counters.
    pub fn total_unread(&self) -> u64 {
        self.conversations.iter().map(|c| u64::from(c.unread_count)).sum()
    }
}
