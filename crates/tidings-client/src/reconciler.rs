//! Message log reconciliation.
//!
//! Each conversation has an append-mostly log ordered by arrival. Optimistic
//! messages are appended when the user sends them and later reconciled by the
//! server's echo and status updates. History batches go in front of the log.
//! A message's position never changes once it is in a log; only its status
//! does.
//!
//! Message IDs are unique across all logs. An index from ID to owning
//! conversation makes status updates O(1) and enforces that uniqueness.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use tidings_proto::{Message, MessageStatus};

use crate::{diagnostic::StatusRejection, error::ReconcileError};

/// Outcome of a received `message` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    /// New message appended to the end of its conversation's log
    Appended {
        /// Conversation the message went to
        conversation_id: String,
    },
    /// Echo of an optimistic message; it moved from `sending` to `sent`
    Confirmed {
        /// Conversation of the message
        conversation_id: String,
    },
    /// Already present with a status past `sending`; nothing changed
    Duplicate {
        /// Conversation of the message
        conversation_id: String,
    },
    /// ID already belongs to a message in a different conversation
    Conflict {
        /// Conversation that owns the ID
        existing: String,
    },
}

/// A status update that was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    /// Conversation of the message
    pub conversation_id: String,
    /// Status before the update
    pub previous: MessageStatus,
    /// Status after the update
    pub status: MessageStatus,
}

/// Result of merging a history batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryMerge {
    /// Messages added
    pub inserted: usize,
    /// Messages skipped because their ID was already known
    pub skipped: usize,
    /// Conversations that received messages, in order of first appearance
    pub conversations: Vec<String>,
}

/// Entries are copy-on-write: snapshots share them until the next change.
#[derive(Debug, Clone, Default)]
struct ConversationLog {
    entries: Arc<Vec<Message>>,
    positions: HashMap<String, usize>,
}

impl ConversationLog {
    fn push(&mut self, message: Message) {
        self.positions.insert(message.id.clone(), self.entries.len());
        Arc::make_mut(&mut self.entries).push(message);
    }

    fn prepend(&mut self, batch: Vec<Message>) {
        let mut entries = batch;
        entries.extend(self.entries.iter().cloned());
        self.entries = Arc::new(entries);

        self.positions.clear();
        for (position, message) in self.entries.iter().enumerate() {
            self.positions.insert(message.id.clone(), position);
        }
    }

    fn get(&self, id: &str) -> Option<&Message> {
        self.positions.get(id).and_then(|&position| self.entries.get(position))
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut Message> {
        let position = *self.positions.get(id)?;
        Arc::make_mut(&mut self.entries).get_mut(position)
    }
}

/// Owner of every conversation's message log.
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    logs: HashMap<String, ConversationLog>,
    /// Message ID to owning conversation
    owners: HashMap<String, String>,
}

impl Reconciler {
    /// Empty reconciler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a locally created message to the end of its conversation.
    ///
    /// # Errors
    ///
    /// - `ReconcileError::InvalidState` if the message is not `sending`
    /// - `ReconcileError::DuplicateMessage` if the ID is already in use
    pub fn insert_optimistic(&mut self, message: Message) -> Result<(), ReconcileError> {
        if message.status != MessageStatus::Sending {
            return Err(ReconcileError::InvalidState {
                message_id: message.id,
                status: message.status,
                operation: "insert optimistic",
            });
        }

        if self.owners.contains_key(&message.id) {
            return Err(ReconcileError::DuplicateMessage(message.id));
        }

        self.append(message);
        Ok(())
    }

    /// Apply a server `message` event.
    ///
    /// Idempotent by ID. A new message is appended with at least `sent`
    /// status. The echo of an optimistic message moves it from `sending` to
    /// `sent` and leaves it where it is; an echo arriving after a later
    /// status update changes nothing.
    pub fn receive(&mut self, mut message: Message) -> Received {
        if let Some(owner) = self.owners.get(&message.id) {
            if *owner != message.conversation_id {
                return Received::Conflict { existing: owner.clone() };
            }

            let conversation_id = owner.clone();
            let Some(log) = self.logs.get_mut(&conversation_id) else {
                return Received::Duplicate { conversation_id };
            };

            // Read first so duplicates never copy a shared log
            if log.get(&message.id).map(|m| m.status) != Some(MessageStatus::Sending) {
                return Received::Duplicate { conversation_id };
            }
            if let Some(entry) = log.get_mut(&message.id) {
                entry.status = MessageStatus::Sent;
            }
            return Received::Confirmed { conversation_id };
        }

        message.status = confirmed_status(message.status);
        let conversation_id = message.conversation_id.clone();
        self.append(message);
        Received::Appended { conversation_id }
    }

    /// Apply a server `message_status` event.
    ///
    /// # Errors
    ///
    /// Returns why the update was rejected: unknown ID, or a transition that
    /// is not forward along `sending < sent < delivered < read` (or
    /// `sending -> failed`).
    pub fn update_status(
        &mut self,
        message_id: &str,
        status: MessageStatus,
    ) -> Result<StatusUpdate, StatusRejection> {
        let Some(conversation_id) = self.owners.get(message_id) else {
            return Err(StatusRejection::UnknownMessage);
        };

        let Some(log) = self.logs.get_mut(conversation_id) else {
            return Err(StatusRejection::UnknownMessage);
        };
        let Some(previous) = log.get(message_id).map(|m| m.status) else {
            return Err(StatusRejection::UnknownMessage);
        };

        if !previous.can_advance_to(status) {
            return Err(StatusRejection::NotMonotonic { current: previous, requested: status });
        }

        if let Some(entry) = log.get_mut(message_id) {
            entry.status = status;
        }
        Ok(StatusUpdate { conversation_id: conversation_id.clone(), previous, status })
    }

    /// Put a batch of older messages in front of the logs they belong to.
    ///
    /// Messages whose ID is already known (in any log, or earlier in the same
    /// batch) are skipped. Batch order is preserved within each conversation
    /// and existing entries keep their relative order.
    pub fn prepend_history(&mut self, messages: Vec<Message>) -> HistoryMerge {
        let mut merge = HistoryMerge::default();
        let mut batches: HashMap<String, Vec<Message>> = HashMap::new();

        for mut message in messages {
            if self.owners.contains_key(&message.id) {
                merge.skipped += 1;
                continue;
            }

            message.status = confirmed_status(message.status);
            self.owners.insert(message.id.clone(), message.conversation_id.clone());

            let batch = batches.entry(message.conversation_id.clone()).or_default();
            if batch.is_empty() {
                merge.conversations.push(message.conversation_id.clone());
            }
            batch.push(message);
            merge.inserted += 1;
        }

        for (conversation_id, batch) in batches {
            self.logs.entry(conversation_id).or_default().prepend(batch);
        }

        merge
    }

    /// Move a failed message back to `sending` and return it for resending.
    ///
    /// # Errors
    ///
    /// - `ReconcileError::UnknownMessage` if no message has this ID
    /// - `ReconcileError::InvalidState` unless the message is `failed`
    pub fn retry(&mut self, message_id: &str) -> Result<Message, ReconcileError> {
        let entry = self
            .owners
            .get(message_id)
            .and_then(|conversation_id| self.logs.get_mut(conversation_id))
            .and_then(|log| log.get_mut(message_id))
            .ok_or_else(|| ReconcileError::UnknownMessage(message_id.to_string()))?;

        if entry.status != MessageStatus::Failed {
            return Err(ReconcileError::InvalidState {
                message_id: message_id.to_string(),
                status: entry.status,
                operation: "retry",
            });
        }

        entry.status = MessageStatus::Sending;
        Ok(entry.clone())
    }

    /// Messages of a conversation in log order.
    pub fn messages(&self, conversation_id: &str) -> &[Message] {
        self.logs.get(conversation_id).map_or(&[], |log| log.entries.as_slice())
    }

    /// Last message of a conversation's log.
    pub fn tail(&self, conversation_id: &str) -> Option<&Message> {
        self.logs.get(conversation_id).and_then(|log| log.entries.last())
    }

    /// Look up a message by ID.
    pub fn get(&self, message_id: &str) -> Option<&Message> {
        let conversation_id = self.owners.get(message_id)?;
        self.logs.get(conversation_id)?.get(message_id)
    }

    /// Total number of messages across all logs.
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    /// Whether no message is known.
    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    /// Every log keyed by conversation, shared rather than copied.
    pub fn to_logs(&self) -> BTreeMap<String, Arc<Vec<Message>>> {
        self.logs.iter().map(|(id, log)| (id.clone(), Arc::clone(&log.entries))).collect()
    }

    fn append(&mut self, message: Message) {
        self.owners.insert(message.id.clone(), message.conversation_id.clone());
        self.logs.entry(message.conversation_id.clone()).or_default().push(message);
    }
}

/// Status for a message the server has acknowledged by sending it to us.
fn confirmed_status(status: MessageStatus) -> MessageStatus {
    match status {
        MessageStatus::Sending | MessageStatus::Failed => MessageStatus::Sent,
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};

    use super::*;

    fn message(id: &str, conversation: &str, sender: &str) -> Message {
        Message::text(id, conversation, sender, format!("body {id}"), DateTime::<Utc>::default())
    }

    fn ids(reconciler: &Reconciler, conversation: &str) -> Vec<String> {
        reconciler.messages(conversation).iter().map(|m| m.id.clone()).collect()
    }

    #[test]
    fn optimistic_insert_appends_sending() {
        let mut reconciler = Reconciler::new();
        reconciler.insert_optimistic(message("m1", "c1", "u1")).unwrap();

        assert_eq!(reconciler.messages("c1").len(), 1);
        assert_eq!(reconciler.get("m1").unwrap().status, MessageStatus::Sending);
    }

    #[test]
    fn optimistic_insert_rejects_duplicates_and_non_sending() {
        let mut reconciler = Reconciler::new();
        reconciler.insert_optimistic(message("m1", "c1", "u1")).unwrap();

        assert_eq!(
            reconciler.insert_optimistic(message("m1", "c1", "u1")),
            Err(ReconcileError::DuplicateMessage("m1".to_string()))
        );
        assert!(matches!(
            reconciler
                .insert_optimistic(message("m2", "c1", "u1").with_status(MessageStatus::Sent)),
            Err(ReconcileError::InvalidState { .. })
        ));
    }

    #[test]
    fn received_message_is_appended_as_sent() {
        let mut reconciler = Reconciler::new();
        let outcome = reconciler.receive(message("m1", "c1", "u2"));

        assert_eq!(outcome, Received::Appended { conversation_id: "c1".to_string() });
        assert_eq!(reconciler.get("m1").unwrap().status, MessageStatus::Sent);
    }

    #[test]
    fn received_message_keeps_later_status() {
        let mut reconciler = Reconciler::new();
        reconciler.receive(message("m1", "c1", "u2").with_status(MessageStatus::Read));
        assert_eq!(reconciler.get("m1").unwrap().status, MessageStatus::Read);
    }

    #[test]
    fn duplicate_messages_grow_log_once() {
        let mut reconciler = Reconciler::new();
        reconciler.receive(message("m1", "c1", "u2"));
        let outcome = reconciler.receive(message("m1", "c1", "u2"));

        assert_eq!(outcome, Received::Duplicate { conversation_id: "c1".to_string() });
        assert_eq!(reconciler.messages("c1").len(), 1);
    }

    #[test]
    fn echo_confirms_optimistic_in_place() {
        let mut reconciler = Reconciler::new();
        reconciler.insert_optimistic(message("mine", "c1", "u1")).unwrap();
        reconciler.receive(message("theirs", "c1", "u2"));

        let outcome = reconciler.receive(message("mine", "c1", "u1"));
        assert_eq!(outcome, Received::Confirmed { conversation_id: "c1".to_string() });
        assert_eq!(ids(&reconciler, "c1"), vec!["mine", "theirs"]);
        assert_eq!(reconciler.get("mine").unwrap().status, MessageStatus::Sent);
    }

    #[test]
    fn echo_after_delivery_does_not_regress() {
        let mut reconciler = Reconciler::new();
        reconciler.insert_optimistic(message("m1", "c1", "u1")).unwrap();
        reconciler.update_status("m1", MessageStatus::Delivered).unwrap();

        reconciler.receive(message("m1", "c1", "u1"));
        assert_eq!(reconciler.get("m1").unwrap().status, MessageStatus::Delivered);
    }

    #[test]
    fn id_reused_in_other_conversation_conflicts() {
        let mut reconciler = Reconciler::new();
        reconciler.receive(message("m1", "c1", "u2"));

        let outcome = reconciler.receive(message("m1", "c2", "u2"));
        assert_eq!(outcome, Received::Conflict { existing: "c1".to_string() });
        assert!(reconciler.messages("c2").is_empty());
    }

    #[test]
    fn status_updates_are_monotonic() {
        let mut reconciler = Reconciler::new();
        reconciler.receive(message("m1", "c1", "u2"));

        let update = reconciler.update_status("m1", MessageStatus::Delivered).unwrap();
        assert_eq!(update.previous, MessageStatus::Sent);

        assert_eq!(
            reconciler.update_status("m1", MessageStatus::Sent),
            Err(StatusRejection::NotMonotonic {
                current: MessageStatus::Delivered,
                requested: MessageStatus::Sent,
            })
        );
        assert_eq!(reconciler.get("m1").unwrap().status, MessageStatus::Delivered);
    }

    #[test]
    fn read_then_sent_stays_read() {
        let mut reconciler = Reconciler::new();
        reconciler.insert_optimistic(message("m1", "c1", "u1")).unwrap();
        reconciler.update_status("m1", MessageStatus::Read).unwrap();

        assert!(reconciler.update_status("m1", MessageStatus::Sent).is_err());
        assert_eq!(reconciler.get("m1").unwrap().status, MessageStatus::Read);
    }

    #[test]
    fn failed_only_from_sending() {
        let mut reconciler = Reconciler::new();
        reconciler.insert_optimistic(message("m1", "c1", "u1")).unwrap();
        reconciler.receive(message("m2", "c1", "u2"));

        assert!(reconciler.update_status("m1", MessageStatus::Failed).is_ok());
        assert!(reconciler.update_status("m2", MessageStatus::Failed).is_err());
    }

    #[test]
    fn unknown_status_target_is_rejected() {
        let mut reconciler = Reconciler::new();
        assert_eq!(
            reconciler.update_status("ghost", MessageStatus::Read),
            Err(StatusRejection::UnknownMessage)
        );
    }

    #[test]
    fn history_is_prepended_deduplicated() {
        let mut reconciler = Reconciler::new();
        reconciler.receive(message("m3", "c1", "u2"));
        reconciler.receive(message("m4", "c1", "u2"));

        let merge = reconciler.prepend_history(vec![
            message("m1", "c1", "u2"),
            message("x1", "c2", "u3"),
            message("m2", "c1", "u2"),
            message("m3", "c1", "u2"),
            message("m1", "c1", "u2"),
        ]);

        assert_eq!(merge.inserted, 3);
        assert_eq!(merge.skipped, 2);
        assert_eq!(merge.conversations, vec!["c1", "c2"]);
        assert_eq!(ids(&reconciler, "c1"), vec!["m1", "m2", "m3", "m4"]);
        assert_eq!(ids(&reconciler, "c2"), vec!["x1"]);

        // Positions were rebuilt: status updates still find the right entry
        reconciler.update_status("m4", MessageStatus::Read).unwrap();
        assert_eq!(reconciler.messages("c1")[3].status, MessageStatus::Read);
    }

    #[test]
    fn retry_only_from_failed() {
        let mut reconciler = Reconciler::new();
        reconciler.insert_optimistic(message("m1", "c1", "u1")).unwrap();

        assert!(matches!(reconciler.retry("m1"), Err(ReconcileError::InvalidState {
            status: MessageStatus::Sending,
            ..
        })));

        reconciler.update_status("m1", MessageStatus::Failed).unwrap();
        let retried = reconciler.retry("m1").unwrap();
        assert_eq!(retried.status, MessageStatus::Sending);
        assert_eq!(reconciler.messages("c1").len(), 1);

        assert_eq!(reconciler.retry("ghost"), Err(ReconcileError::UnknownMessage("ghost".into())));
    }

    #[test]
    fn retried_message_can_be_confirmed() {
        let mut reconciler = Reconciler::new();
        reconciler.insert_optimistic(message("m1", "c1", "u1")).unwrap();
        reconciler.update_status("m1", MessageStatus::Failed).unwrap();
        reconciler.retry("m1").unwrap();

        assert!(matches!(
            reconciler.receive(message("m1", "c1", "u1")),
            Received::Confirmed { .. }
        ));
        assert_eq!(reconciler.get("m1").unwrap().status, MessageStatus::Sent);
    }
}
