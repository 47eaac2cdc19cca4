//! Conversation summaries.
//!
//! Projection of the message logs onto the conversation list: the last
//! message and activity time of each conversation follow its log's tail, and
//! unread counters follow incoming traffic. The list itself comes from the
//! server and is replaced wholesale, except for the unread counters of
//! conversations already listed, which only `mark_read` resets.

use std::collections::HashMap;

use tidings_proto::{Conversation, Message};

/// Conversation list with derived summaries.
#[derive(Debug, Clone, Default)]
pub struct ConversationIndex {
    conversations: Vec<Conversation>,
    positions: HashMap<String, usize>,
    active: Option<String>,
}

impl ConversationIndex {
    /// Empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole list. Later duplicates of an ID are dropped.
    ///
    /// Conversations that were already listed keep their local unread
    /// counter. Summaries are taken as sent; callers re-derive them from
    /// local logs with [`ConversationIndex::sync_tail`].
    pub fn replace_all(&mut self, conversations: Vec<Conversation>) {
        let previous = std::mem::take(&mut self.conversations);
        let unread: HashMap<String, u32> =
            previous.into_iter().map(|c| (c.id, c.unread_count)).collect();
        self.positions.clear();

        for mut conversation in conversations {
            if self.positions.contains_key(&conversation.id) {
                tracing::debug!(
                    conversation_id = %conversation.id,
                    "duplicate conversation in list"
                );
                continue;
            }
            if let Some(&count) = unread.get(&conversation.id) {
                conversation.unread_count = count;
            }
            self.positions.insert(conversation.id.clone(), self.conversations.len());
            self.conversations.push(conversation);
        }
    }

    /// Bring a conversation's summary in line with its log tail.
    ///
    /// Returns `true` if anything changed. Constant time: only the tail is
    /// compared, never the log.
    pub fn sync_tail(&mut self, conversation_id: &str, tail: &Message) -> bool {
        let Some(conversation) = self.get_mut(conversation_id) else {
            return false;
        };

        let unchanged = conversation.updated_at == tail.timestamp
            && conversation
                .last_message
                .as_ref()
                .is_some_and(|last| last.id == tail.id && last.status == tail.status);
        if unchanged {
            return false;
        }

        conversation.last_message = Some(tail.clone());
        conversation.updated_at = tail.timestamp;
        true
    }

    /// Count a newly received message from someone else.
    ///
    /// Increments the unread counter unless the conversation is the active
    /// one. Returns `true` if the counter changed.
    pub fn record_incoming(&mut self, conversation_id: &str) -> bool {
        if self.active.as_deref() == Some(conversation_id) {
            return false;
        }

        let Some(conversation) = self.get_mut(conversation_id) else {
            return false;
        };

        conversation.unread_count = conversation.unread_count.saturating_add(1);
        true
    }

    /// Reset a conversation's unread counter. Returns `false` if the
    /// conversation is unknown.
    pub fn mark_read(&mut self, conversation_id: &str) -> bool {
        let Some(conversation) = self.get_mut(conversation_id) else {
            return false;
        };

        conversation.unread_count = 0;
        true
    }

    /// Designate the conversation the user is looking at.
    pub fn set_active(&mut self, conversation_id: Option<String>) {
        self.active = conversation_id;
    }

    /// Conversation the user is looking at.
    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Look up a conversation.
    pub fn get(&self, conversation_id: &str) -> Option<&Conversation> {
        self.positions.get(conversation_id).and_then(|&i| self.conversations.get(i))
    }

    /// All conversations in server order.
    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    fn get_mut(&mut self, conversation_id: &str) -> Option<&mut Conversation> {
        self.positions.get(conversation_id).and_then(|&i| self.conversations.get_mut(i))
    }
}
