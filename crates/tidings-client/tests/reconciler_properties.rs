//! Property tests for message reconciliation.
//!
//! Random interleavings of server events (echoes, duplicates, status
//! updates in any order, history pages) against a reconciler, checking the
//! properties that must hold whatever the server does.

use proptest::prelude::*;
use tidings_client::Reconciler;
use tidings_harness::fixtures;
use tidings_proto::{Message, MessageStatus};

#[derive(Debug, Clone)]
enum Op {
    /// Server delivers message `n` in conversation `n % 2`
    Receive(u8),
    /// Status update for message `n`
    Status(u8, MessageStatus),
    /// History page containing messages `n..n+len`
    History(u8, u8),
    /// Retry message `n`
    Retry(u8),
}

fn status() -> impl Strategy<Value = MessageStatus> {
    prop_oneof![
        Just(MessageStatus::Sending),
        Just(MessageStatus::Sent),
        Just(MessageStatus::Delivered),
        Just(MessageStatus::Read),
        Just(MessageStatus::Failed),
    ]
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..8).prop_map(Op::Receive),
        (0u8..8, status()).prop_map(|(n, s)| Op::Status(n, s)),
        (0u8..8, 1u8..4).prop_map(|(n, len)| Op::History(n, len)),
        (0u8..8).prop_map(Op::Retry),
    ]
}

fn message(n: u8) -> Message {
    fixtures::message(&format!("m{n}"), &format!("c{}", n % 2), "u2", &format!("body {n}"))
}

fn apply(reconciler: &mut Reconciler, op: &Op) {
    match op {
        Op::Receive(n) => {
            reconciler.receive(message(*n));
        },
        Op::Status(n, status) => {
            let _ = reconciler.update_status(&format!("m{n}"), *status);
        },
        Op::History(n, len) => {
            let page = (*n..n.saturating_add(*len)).map(message).collect();
            reconciler.prepend_history(page);
        },
        Op::Retry(n) => {
            let _ = reconciler.retry(&format!("m{n}"));
        },
    }
}

proptest! {
    /// INVARIANT: a message ID is stored at most once, however often and
    /// however it arrives.
    #[test]
    fn ids_stay_unique(ops in prop::collection::vec(op(), 0..64)) {
        let mut reconciler = Reconciler::new();
        for op in &ops {
            apply(&mut reconciler, op);
        }

        let logs = reconciler.to_logs();
        let mut ids: Vec<_> =
            logs.values().flat_map(|log| log.iter()).map(|m| m.id.clone()).collect();
        let total = ids.len();
        ids.sort();
        ids.dedup();

        prop_assert_eq!(ids.len(), total);
        prop_assert_eq!(reconciler.len(), total);
    }

    /// INVARIANT: replaying the same receive is a no-op.
    #[test]
    fn receive_is_idempotent(ops in prop::collection::vec(op(), 0..32), n in 0u8..8) {
        let mut reconciler = Reconciler::new();
        for op in &ops {
            apply(&mut reconciler, op);
        }

        reconciler.receive(message(n));
        let once = reconciler.to_logs();
        reconciler.receive(message(n));

        prop_assert_eq!(reconciler.to_logs(), once);
    }

    /// INVARIANT: status updates never move a message backwards.
    #[test]
    fn status_updates_are_monotonic(updates in prop::collection::vec(status(), 0..16)) {
        let mut reconciler = Reconciler::new();
        reconciler.receive(message(0));

        for status in updates {
            let before = reconciler.get("m0").map(|m| m.status);
            let result = reconciler.update_status("m0", status);
            let after = reconciler.get("m0").map(|m| m.status);

            match (before, after) {
                (Some(before), Some(after)) if result.is_ok() => {
                    prop_assert!(before.can_advance_to(after));
                },
                _ => {
                    prop_assert_eq!(before, after);
                },
            }
        }
    }

    /// INVARIANT: existing entries keep their relative order.
    #[test]
    fn log_order_is_stable(ops in prop::collection::vec(op(), 0..64)) {
        let mut reconciler = Reconciler::new();
        let mut previous = reconciler.to_logs();

        for op in &ops {
            apply(&mut reconciler, op);
            let current = reconciler.to_logs();

            for (conversation_id, before) in &previous {
                let expected: Vec<&String> = before.iter().map(|m| &m.id).collect();
                let kept: Vec<&String> = current[conversation_id]
                    .iter()
                    .map(|m| &m.id)
                    .filter(|id| expected.contains(id))
                    .collect();
                prop_assert_eq!(kept, expected);
            }
            previous = current;
        }
    }
}
