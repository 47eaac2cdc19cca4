//! Shell behavior against a simulated session.

use tidings_cli::{Output, Shell};
use tidings_harness::{SimSession, fixtures};
use tidings_proto::{InboundEvent, OutboundCommand};

async fn run_shell(session: &SimSession, input: &str) -> String {
    let output = Output::new(Vec::new(), fixtures::USER_ID);
    let shell = Shell::new(session.handle.clone(), output);
    let written = shell.run(input.as_bytes()).await.unwrap();
    String::from_utf8(written).unwrap()
}

#[tokio::test(start_paused = true)]
async fn selected_conversation_receives_typed_lines() {
    let session = SimSession::spawn(&fixtures::config());
    session.connect().await;
    session.transport.sent(0);

    let written = run_shell(&session, "/select c1\nhello there\n/quit\n").await;
    session.settle().await;

    assert!(written.contains("active conversation: c1"));

    let sent = session.transport.sent(0);
    assert_eq!(sent.len(), 1);
    let OutboundCommand::SendMessage { message } = OutboundCommand::decode(&sent[0]).unwrap() else {
        panic!("expected send_message, got {}", sent[0]);
    };
    assert_eq!(message.conversation_id, "c1");
    assert_eq!(message.content, "hello there");

    session.finish().await;
}

#[tokio::test(start_paused = true)]
async fn typing_without_a_conversation_is_refused() {
    let session = SimSession::spawn(&fixtures::config());
    session.connect().await;
    session.transport.sent(0);

    let written = run_shell(&session, "hello\n/quit\n").await;
    session.settle().await;

    assert!(written.contains("no active conversation"));
    assert!(session.transport.sent(0).is_empty());

    session.finish().await;
}

#[tokio::test(start_paused = true)]
async fn rejected_commands_are_printed() {
    let session = SimSession::spawn(&fixtures::config());
    session.connect().await;

    let written = run_shell(&session, "/read nowhere\n/retry msg-0-missing\n/dance\n/quit\n").await;

    assert!(written.contains("nowhere"));
    assert!(written.contains("msg-0-missing"));
    assert!(written.contains("unknown command /dance"));

    session.finish().await;
}

#[tokio::test(start_paused = true)]
async fn list_shows_unread_counts() {
    let session = SimSession::spawn(&fixtures::config());
    session.connect().await;

    let conversations = vec![fixtures::conversation("c1", "u2")];
    session.transport.push(0, &InboundEvent::Conversations { conversations }).await;
    let message = fixtures::message("m1", "c1", "u2", "hi");
    session.transport.push(0, &InboundEvent::Message { message }).await;
    session.settle().await;

    let written = run_shell(&session, "/list\n/quit\n").await;

    assert!(written.contains("c1  u2  (1 unread)  last: hi"));

    session.finish().await;
}

#[tokio::test(start_paused = true)]
async fn end_of_input_ends_the_shell() {
    let session = SimSession::spawn(&fixtures::config());

    let written = run_shell(&session, "").await;

    assert!(written.contains("/help for commands"));
    session.finish().await;
}
