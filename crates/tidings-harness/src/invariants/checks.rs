//! Standard session invariants.

use std::collections::{HashMap, HashSet};

use tidings_proto::MessageStatus;

use super::{Invariant, InvariantResult, SessionTrace};

/// A message ID appears at most once across all conversation logs.
pub struct UniqueMessageIds;

impl Invariant for UniqueMessageIds {
    fn name(&self) -> &'static str {
        "unique_message_ids"
    }

    fn check(&self, trace: &SessionTrace) -> InvariantResult {
        for (n, snapshot) in trace.snapshots.iter().enumerate() {
            let mut seen = HashSet::new();
            for message in snapshot.all_messages() {
                if !seen.insert(message.id.as_str()) {
                    return Err(self.violation(format!(
                        "snapshot {n}: message {} appears more than once",
                        message.id
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Once a message is in a conversation's log it stays there.
pub struct MessagesNeverVanish;

impl Invariant for MessagesNeverVanish {
    fn name(&self) -> &'static str {
        "messages_never_vanish"
    }

    fn check(&self, trace: &SessionTrace) -> InvariantResult {
        for (before, after) in trace.transitions() {
            for (conversation_id, log) in &before.messages {
                let later: HashSet<_> =
                    after.messages_in(conversation_id).iter().map(|m| m.id.as_str()).collect();

                if let Some(missing) = log.iter().find(|m| !later.contains(m.id.as_str())) {
                    return Err(self.violation(format!(
                        "message {} left conversation {conversation_id}",
                        missing.id
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Statuses only move forward (`sending` < `sent` < `delivered` < `read`,
/// or `sending` to `failed`). The one way back is a retry, `failed` to
/// `sending`.
pub struct StatusProgression;

impl Invariant for StatusProgression {
    fn name(&self) -> &'static str {
        "status_progression"
    }

    fn check(&self, trace: &SessionTrace) -> InvariantResult {
        for (before, after) in trace.transitions() {
            let current: HashMap<_, _> =
                after.all_messages().map(|m| (m.id.as_str(), m.status)).collect();

            for message in before.all_messages() {
                let Some(&next) = current.get(message.id.as_str()) else { continue };
                let prev = message.status;

                let allowed = prev == next
                    || prev.can_advance_to(next)
                    || (prev == MessageStatus::Failed && next == MessageStatus::Sending);

                if !allowed {
                    return Err(self.violation(format!(
                        "message {} went from {prev} to {next}",
                        message.id
                    )));
                }
            }
        }
        Ok(())
    }
}

/// The reconnect attempt counter never exceeds the configured limit.
pub struct ConnectionAttemptsBounded;

impl Invariant for ConnectionAttemptsBounded {
    fn name(&self) -> &'static str {
        "connection_attempts_bounded"
    }

    fn check(&self, trace: &SessionTrace) -> InvariantResult {
        let limit = trace.max_reconnect_attempts;
        for (n, snapshot) in trace.snapshots.iter().enumerate() {
            if snapshot.connection.attempt > limit {
                return Err(self.violation(format!(
                    "snapshot {n}: attempt {} exceeds limit {limit}",
                    snapshot.connection.attempt
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tidings_client::ChatSnapshot;

    use super::*;
    use crate::fixtures;

    fn with_messages(messages: Vec<tidings_proto::Message>) -> ChatSnapshot {
        let mut snapshot = ChatSnapshot::default();
        for message in messages {
            let log = snapshot.messages.entry(message.conversation_id.clone()).or_default();
            std::sync::Arc::make_mut(log).push(message);
        }
        snapshot
    }

    fn trace(snapshots: Vec<ChatSnapshot>) -> SessionTrace {
        SessionTrace { max_reconnect_attempts: 5, snapshots }
    }

    #[test]
    fn duplicate_ids_across_conversations_are_caught() {
        let a = fixtures::message("m1", "c1", "u2", "hi");
        let b = fixtures::message("m1", "c2", "u2", "hi");

        let result = UniqueMessageIds.check(&trace(vec![with_messages(vec![a, b])]));
        assert!(result.is_err());
    }

    #[test]
    fn vanished_message_is_caught() {
        let m = fixtures::message("m1", "c1", "u2", "hi");
        let result =
            MessagesNeverVanish
                .check(&trace(vec![with_messages(vec![m]), ChatSnapshot::default()]));
        assert!(result.is_err());
    }

    #[test]
    fn retry_is_the_only_allowed_regression() {
        let failed = fixtures::message("m1", "c1", "u1", "hi").with_status(MessageStatus::Failed);
        let sending = failed.clone().with_status(MessageStatus::Sending);
        let read = failed.clone().with_status(MessageStatus::Read);
        let sent = failed.clone().with_status(MessageStatus::Sent);

        let retry = trace(vec![with_messages(vec![failed]), with_messages(vec![sending])]);
        assert!(StatusProgression.check(&retry).is_ok());

        let regress = trace(vec![with_messages(vec![read]), with_messages(vec![sent])]);
        assert!(StatusProgression.check(&regress).is_err());
    }

    #[test]
    fn attempts_above_limit_are_caught() {
        let mut snapshot = ChatSnapshot::default();
        snapshot.connection.attempt = 6;
        assert!(ConnectionAttemptsBounded.check(&trace(vec![snapshot])).is_err());
    }
}
