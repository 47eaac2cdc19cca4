//! Runtime behavior under a paused clock.
//!
//! Each test drives a whole session (runtime loop, client, backoff timers)
//! through the simulated transport and checks what consumers observe.

use std::time::Duration;

use tidings_app::{ConnectionPhase, ConnectionState, Diagnostic, RuntimeError};
use tidings_client::{ClientError, ReconcileError};
use tidings_core::{ConnectionDiagnostic, TransportError};
use tidings_harness::{InvariantRegistry, SimSession, fixtures, sim_transport::OUTBOUND_CAPACITY};
use tidings_proto::{InboundEvent, MessageStatus, OutboundCommand};

fn state(phase: ConnectionPhase, attempt: u32) -> ConnectionState {
    ConnectionState { phase, attempt }
}

#[tokio::test(start_paused = true)]
async fn start_opens_and_sends_init() {
    let session = SimSession::spawn(&fixtures::config());
    assert_eq!(session.handle.state(), state(ConnectionPhase::Disconnected, 0));

    session.handle.start().await.unwrap();
    assert_eq!(session.handle.state(), state(ConnectionPhase::Connecting, 0));
    assert_eq!(session.transport.connection_count(), 1);
    assert_eq!(session.transport.url(0), fixtures::ENDPOINT);

    session.accept_latest().await;
    assert_eq!(session.handle.state(), state(ConnectionPhase::Connected, 0));

    let sent = session.transport.sent(0);
    assert_eq!(sent.len(), 1);
    assert_eq!(
        OutboundCommand::decode(&sent[0]).unwrap(),
        OutboundCommand::Init { user_id: fixtures::USER_ID.to_string() }
    );

    session.finish().await;
}

#[tokio::test(start_paused = true)]
async fn auth_token_is_appended_to_the_url() {
    let config = fixtures::config().with_auth_token("s3cret");
    let session = SimSession::spawn(&config);

    session.handle.start().await.unwrap();
    assert_eq!(session.transport.url(0), format!("{}?token=s3cret", fixtures::ENDPOINT));

    session.finish().await;
}

#[tokio::test(start_paused = true)]
async fn second_start_is_rejected() {
    let session = SimSession::spawn(&fixtures::config());
    session.connect().await;

    let err = session.handle.start().await.unwrap_err();
    assert!(matches!(err, RuntimeError::Client(ClientError::Connection(_))));
    assert_eq!(session.transport.connection_count(), 1);

    session.finish().await;
}

#[tokio::test(start_paused = true)]
async fn reconnect_waits_exactly_one_interval() {
    let config = fixtures::config().with_reconnect_interval(Duration::from_millis(3000));
    let session = SimSession::spawn(&config);
    session.connect().await;

    session.transport.close(0, Some("server restart")).await;
    session.settle().await;
    assert_eq!(session.handle.state(), state(ConnectionPhase::Reconnecting, 1));
    assert!(session.transport.is_closed(0));

    tokio::time::advance(Duration::from_millis(2999)).await;
    session.settle().await;
    assert_eq!(session.transport.connection_count(), 1);

    tokio::time::advance(Duration::from_millis(1)).await;
    session.settle().await;
    assert_eq!(session.transport.connection_count(), 2);
    assert_eq!(session.handle.state(), state(ConnectionPhase::Connecting, 1));

    session.accept_latest().await;
    assert_eq!(session.handle.state(), state(ConnectionPhase::Connected, 0));

    session.finish().await;
}

#[tokio::test(start_paused = true)]
async fn exhausted_reconnects_close_the_session() {
    let config = fixtures::config().with_max_reconnect_attempts(2);
    let session = SimSession::spawn(&config);
    let mut diagnostics = session.handle.subscribe_diagnostics();
    session.connect().await;

    session.transport.close(0, None).await;
    session.settle().await;

    for index in 1..=2 {
        tokio::time::advance(Duration::from_millis(3000)).await;
        session.settle().await;
        assert_eq!(session.transport.connection_count(), index + 1);

        session.transport.fail(index, TransportError::Connect("refused".into())).await;
        session.settle().await;
    }

    assert_eq!(session.handle.state(), state(ConnectionPhase::Closed, 2));

    // No further attempts, however long we wait
    tokio::time::advance(Duration::from_secs(60)).await;
    session.settle().await;
    assert_eq!(session.transport.connection_count(), 3);

    let mut exhausted = false;
    while let Ok(diagnostic) = diagnostics.try_recv() {
        if diagnostic
            == Diagnostic::Connection(ConnectionDiagnostic::ReconnectExhausted { attempts: 2 })
        {
            exhausted = true;
        }
    }
    assert!(exhausted);

    session.finish().await;
}

#[tokio::test(start_paused = true)]
async fn disabled_auto_reconnect_closes_on_first_loss() {
    let config = fixtures::config().with_auto_reconnect(false);
    let session = SimSession::spawn(&config);
    session.connect().await;

    session.transport.fail(0, TransportError::Io("reset".into())).await;
    session.settle().await;

    assert_eq!(session.handle.state(), state(ConnectionPhase::Closed, 0));
    tokio::time::advance(Duration::from_secs(60)).await;
    session.settle().await;
    assert_eq!(session.transport.connection_count(), 1);

    session.finish().await;
}

#[tokio::test(start_paused = true)]
async fn stop_during_backoff_cancels_the_timer() {
    let session = SimSession::spawn(&fixtures::config());
    session.connect().await;

    session.transport.close(0, None).await;
    session.settle().await;
    assert_eq!(session.handle.state().phase, ConnectionPhase::Reconnecting);

    session.handle.stop().await.unwrap();
    assert_eq!(session.handle.state().phase, ConnectionPhase::Closed);

    tokio::time::advance(Duration::from_secs(60)).await;
    session.settle().await;
    assert_eq!(session.transport.connection_count(), 1);
    assert_eq!(session.handle.state().phase, ConnectionPhase::Closed);

    session.finish().await;
}

#[tokio::test(start_paused = true)]
async fn stop_is_idempotent() {
    let session = SimSession::spawn(&fixtures::config());
    session.connect().await;

    session.handle.stop().await.unwrap();
    session.handle.stop().await.unwrap();

    assert_eq!(session.handle.state().phase, ConnectionPhase::Closed);
    assert!(session.transport.is_closed(0));

    session.finish().await;
}

#[tokio::test(start_paused = true)]
async fn force_reconnect_revives_a_closed_session() {
    let session = SimSession::spawn(&fixtures::config());
    session.connect().await;
    session.handle.stop().await.unwrap();

    session.handle.force_reconnect().await.unwrap();
    assert_eq!(session.handle.state(), state(ConnectionPhase::Connecting, 0));

    let index = session.accept_latest().await;
    assert_eq!(index, 1);
    assert_eq!(session.handle.state(), state(ConnectionPhase::Connected, 0));

    session.finish().await;
}

#[tokio::test(start_paused = true)]
async fn events_from_a_replaced_connection_are_ignored() {
    let session = SimSession::spawn(&fixtures::config());
    session.connect().await;

    session.handle.force_reconnect().await.unwrap();
    session.accept_latest().await;

    assert_eq!(session.transport.connection_count(), 2);
    assert_eq!(session.transport.open_count(), 1);
    assert!(session.transport.is_closed(0));

    let conversations = vec![fixtures::conversation("c1", "u2")];
    session.transport.push(0, &InboundEvent::Conversations { conversations }).await;
    session.settle().await;

    assert!(session.handle.snapshot().conversations.is_empty());

    session.finish().await;
}

#[tokio::test(start_paused = true)]
async fn send_while_disconnected_stays_sending() {
    let session = SimSession::spawn(&fixtures::config());

    let message = session.handle.send_message("c1", "hello").await.unwrap();

    assert_eq!(message.status, MessageStatus::Sending);
    let snapshot = session.handle.snapshot();
    assert_eq!(snapshot.messages_in("c1"), std::slice::from_ref(&message));
    assert_eq!(session.transport.connection_count(), 0);

    session.finish().await;
}

#[tokio::test(start_paused = true)]
async fn send_while_connected_writes_one_frame() {
    let session = SimSession::spawn(&fixtures::config());
    session.connect().await;
    session.transport.sent(0);

    let message = session.handle.send_message("c1", "hello").await.unwrap();
    session.settle().await;

    let sent = session.transport.sent(0);
    assert_eq!(sent.len(), 1);
    assert_eq!(
        OutboundCommand::decode(&sent[0]).unwrap(),
        OutboundCommand::SendMessage { message: message.clone() }
    );

    session.transport.push(0, &InboundEvent::Message { message: message.clone() }).await;
    session.settle().await;

    let snapshot = session.handle.snapshot();
    assert_eq!(snapshot.messages_in("c1").len(), 1);
    assert_eq!(snapshot.message(&message.id).unwrap().status, MessageStatus::Sent);

    session.finish().await;
}

/// INVARIANT: a connection that stops reading never stalls the session.
/// Frames beyond its queue are dropped and reported.
#[tokio::test(start_paused = true)]
async fn full_outbound_queue_drops_instead_of_blocking() {
    let session = SimSession::spawn(&fixtures::config());
    session.connect().await;
    session.transport.sent(0);
    let mut diagnostics = session.handle.subscribe_diagnostics();

    let total = OUTBOUND_CAPACITY + 3;
    for i in 0..total {
        session.handle.send_message("c1", format!("burst {i}")).await.unwrap();
    }

    // Still processing inbound events
    let conversations = vec![fixtures::conversation("c1", "u2")];
    session.transport.push(0, &InboundEvent::Conversations { conversations }).await;
    session.settle().await;
    let snapshot = session.handle.snapshot();
    assert_eq!(snapshot.conversations.len(), 1);
    assert_eq!(snapshot.messages_in("c1").len(), total);

    assert_eq!(session.transport.sent(0).len(), OUTBOUND_CAPACITY);
    let mut dropped = 0;
    while let Ok(diagnostic) = diagnostics.try_recv() {
        if matches!(diagnostic, Diagnostic::FrameDropped { .. }) {
            dropped += 1;
        }
    }
    assert_eq!(dropped, 3);

    session.finish().await;
}

#[tokio::test(start_paused = true)]
async fn retry_of_a_sent_message_fails() {
    let session = SimSession::spawn(&fixtures::config());
    session.connect().await;

    let message = session.handle.send_message("c1", "hello").await.unwrap();
    session.transport.push(0, &InboundEvent::Message { message: message.clone() }).await;
    session.settle().await;
    session.transport.sent(0);

    let err = session.handle.retry(message.id.clone()).await.unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::Client(ClientError::Reconcile(ReconcileError::InvalidState { .. }))
    ));
    session.settle().await;
    assert!(session.transport.sent(0).is_empty());

    session.finish().await;
}

#[tokio::test(start_paused = true)]
async fn snapshot_watchers_see_server_events() {
    let session = SimSession::spawn(&fixtures::config());
    let mut snapshots = session.handle.watch_snapshot();
    session.connect().await;
    assert!(session.handle.snapshot().is_loading);

    let conversations = vec![fixtures::conversation("c1", "u2")];
    session.transport.push(0, &InboundEvent::Conversations { conversations }).await;

    snapshots.wait_for(|s| !s.conversations.is_empty()).await.unwrap();
    let snapshot = session.handle.snapshot();
    assert!(!snapshot.is_loading);
    assert_eq!(snapshot.conversations[0].id, "c1");

    let incoming = fixtures::message("m1", "c1", "u2", "hi");
    session.transport.push(0, &InboundEvent::Message { message: incoming }).await;
    snapshots.wait_for(|s| s.total_unread() == 1).await.unwrap();

    session.handle.mark_read("c1").await.unwrap();
    assert_eq!(session.handle.snapshot().total_unread(), 0);

    session.finish().await;
}

#[tokio::test(start_paused = true)]
async fn malformed_frames_are_reported_not_fatal() {
    let session = SimSession::spawn(&fixtures::config());
    let mut diagnostics = session.handle.subscribe_diagnostics();
    session.connect().await;

    session.transport.push_raw(0, "{not json").await;
    session.transport.push_raw(0, r#"{"type":"typing","userId":"u2"}"#).await;
    session.settle().await;

    assert!(matches!(
        diagnostics.try_recv().unwrap(),
        Diagnostic::Connection(ConnectionDiagnostic::Decode(_))
    ));
    assert_eq!(
        diagnostics.try_recv().unwrap(),
        Diagnostic::Connection(ConnectionDiagnostic::Unrecognized { kind: "typing".into() })
    );
    assert_eq!(session.handle.state().phase, ConnectionPhase::Connected);

    session.finish().await;
}

#[tokio::test(start_paused = true)]
async fn page_size_is_exposed_on_the_handle() {
    let session = SimSession::spawn(&fixtures::config().with_page_size(20));
    assert_eq!(session.handle.page_size(), 20);
    session.finish().await;
}

#[tokio::test(start_paused = true)]
async fn handle_reports_stopped_after_shutdown() {
    let session = SimSession::spawn(&fixtures::config());
    let handle = session.handle.clone();
    session.finish().await;

    assert_eq!(handle.start().await, Err(RuntimeError::Stopped));
}

#[tokio::test(start_paused = true)]
async fn flapping_connection_keeps_invariants() {
    let registry = InvariantRegistry::standard();
    let mut session = SimSession::spawn_with_seed(&fixtures::config(), 42);
    session.connect().await;
    session.observe();

    for round in 0..4 {
        let connection = session.transport.connection_count() - 1;
        let message = session.handle.send_message("c1", format!("round {round}")).await.unwrap();
        session.observe();

        let echo = InboundEvent::Message { message: message.clone() };
        session.transport.push(connection, &echo).await;
        session
            .transport
            .push(connection, &InboundEvent::MessageStatus {
                message_id: message.id.clone(),
                status: MessageStatus::Delivered,
            })
            .await;
        session.settle().await;
        session.observe();

        session.transport.close(connection, None).await;
        session.settle().await;
        session.observe();

        tokio::time::advance(Duration::from_millis(3000)).await;
        session.settle().await;
        session.accept_latest().await;
        session.observe();
    }

    registry.assert_all(session.trace(), "after flapping connection");
    assert_eq!(session.handle.snapshot().messages_in("c1").len(), 4);

    session.finish().await;
}
