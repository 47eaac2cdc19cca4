//! Session state machine.
//!
//! Combines the connection manager, the message reconciler and the
//! conversation index behind one event-in, actions-out interface. All state
//! transitions for a session go through [`Client::handle`] (or the equivalent
//! direct methods), so a single caller loop serializes everything.

use chrono::{DateTime, Utc};
use tidings_core::{
    ClientConfig, ConnectionAction, ConnectionDiagnostic, ConnectionError, ConnectionManager,
    ConnectionState, Environment, Generation, TimerId, TransportEvent,
};
use tidings_proto::{EncodeError, InboundEvent, Message, MessageStatus, OutboundCommand};

use crate::{
    diagnostic::Diagnostic,
    error::ClientError,
    event::{ClientAction, ClientEvent},
    index::ConversationIndex,
    reconciler::{Received, Reconciler},
    snapshot::ChatSnapshot,
};

/// Length of the random suffix in generated message IDs.
const MESSAGE_ID_SUFFIX_LEN: usize = 7;

/// Chat session client.
///
/// Pure state machine. Environment is used for timestamps and message IDs
/// only; all I/O is expressed as [`ClientAction`]s.
pub struct Client<E: Environment> {
    env: E,
    user_id: String,
    page_size: u32,
    connection: ConnectionManager,
    reconciler: Reconciler,
    index: ConversationIndex,
    /// Waiting for the first conversation list since the last (re)start
    loading: bool,
    /// Snapshot-visible state changed during the current operation
    dirty: bool,
}

impl<E: Environment> Client<E> {
    /// Create a client for `config`.
    ///
    /// # Errors
    ///
    /// - `ClientError::Config` if the configuration is invalid
    pub fn new(env: E, config: &ClientConfig) -> Result<Self, ClientError> {
        let connection = ConnectionManager::new(config)?;

        Ok(Self {
            env,
            user_id: config.user_id.clone(),
            page_size: config.page_size,
            connection,
            reconciler: Reconciler::new(),
            index: ConversationIndex::new(),
            loading: false,
            dirty: false,
        })
    }

    /// Process a client event.
    pub fn handle(&mut self, event: ClientEvent) -> Result<Vec<ClientAction>, ClientError> {
        match event {
            ClientEvent::Start => self.start(),
            ClientEvent::Stop => Ok(self.stop()),
            ClientEvent::ForceReconnect => Ok(self.force_reconnect()),
            ClientEvent::Transport { generation, event } => {
                Ok(self.handle_transport(generation, event))
            },
            ClientEvent::TimerFired(timer) => Ok(self.handle_timer(timer)),
            ClientEvent::SendMessage { conversation_id, content } => {
                self.send_message(&conversation_id, content).map(|(_, actions)| actions)
            },
            ClientEvent::Retry { message_id } => self.retry(&message_id),
            ClientEvent::SelectConversation { conversation_id } => {
                Ok(self.select_conversation(conversation_id))
            },
            ClientEvent::MarkRead { conversation_id } => self.mark_read(&conversation_id),
            ClientEvent::Ingest(event) => Ok(self.ingest(event)),
        }
    }

    /// Begin connecting.
    ///
    /// # Errors
    ///
    /// - `ClientError::Connection` if the session was already started
    pub fn start(&mut self) -> Result<Vec<ClientAction>, ClientError> {
        let actions = self.connection.start()?;
        self.loading = true;
        self.dirty = true;
        Ok(self.absorb(actions))
    }

    /// Stop the session. Idempotent.
    pub fn stop(&mut self) -> Vec<ClientAction> {
        let actions = self.connection.stop();
        self.absorb(actions)
    }

    /// Drop the current connection and reconnect with a fresh attempt count.
    pub fn force_reconnect(&mut self) -> Vec<ClientAction> {
        let actions = self.connection.force_reconnect();
        self.loading = true;
        self.dirty = true;
        self.absorb(actions)
    }

    /// Process an event from transport `generation`.
    pub fn handle_transport(
        &mut self,
        generation: Generation,
        event: TransportEvent,
    ) -> Vec<ClientAction> {
        let actions = self.connection.handle_transport(generation, event);
        self.absorb(actions)
    }

    /// Process an expired timer.
    pub fn handle_timer(&mut self, timer: TimerId) -> Vec<ClientAction> {
        let actions = self.connection.handle_timer(timer);
        self.absorb(actions)
    }

    /// Send a text message optimistically.
    ///
    /// The message is appended to the conversation's log as `sending` before
    /// anything touches the network and is returned immediately. If the
    /// connection is not `Connected` the message stays in the log without a
    /// transport write and a [`Diagnostic::SendDeferred`] is reported.
    ///
    /// # Errors
    ///
    /// - `ClientError::Reconcile` if the generated ID collides
    pub fn send_message(
        &mut self,
        conversation_id: &str,
        content: impl Into<String>,
    ) -> Result<(Message, Vec<ClientAction>), ClientError> {
        let millis = self.env.wall_clock_millis();
        let timestamp = DateTime::<Utc>::from_timestamp_millis(millis).unwrap_or_default();
        let id = self.message_id(millis);

        let message = Message::text(id, conversation_id, self.user_id.clone(), content, timestamp);
        self.reconciler.insert_optimistic(message.clone())?;
        self.refresh_tail(conversation_id);
        self.dirty = true;

        tracing::debug!(message_id = %message.id, conversation_id, "optimistic send");

        let mut out = Vec::new();
        self.transmit(&message, &mut out);
        self.finish(&mut out);

        let message = self.reconciler.get(&message.id).cloned().unwrap_or(message);
        Ok((message, out))
    }

    /// Resend a failed message.
    ///
    /// # Errors
    ///
    /// - `ClientError::Reconcile` with `InvalidState` unless the message is
    ///   `failed`; nothing is sent in that case
    /// - `ClientError::Reconcile` with `UnknownMessage` for an unknown ID
    pub fn retry(&mut self, message_id: &str) -> Result<Vec<ClientAction>, ClientError> {
        let message = self.reconciler.retry(message_id)?;
        self.refresh_tail(&message.conversation_id);
        self.dirty = true;

        tracing::debug!(message_id, "retrying failed message");

        let mut out = Vec::new();
        self.transmit(&message, &mut out);
        self.finish(&mut out);
        Ok(out)
    }

    /// Designate the active conversation. Unread counters are left alone.
    pub fn select_conversation(&mut self, conversation_id: Option<String>) -> Vec<ClientAction> {
        if self.index.active() == conversation_id.as_deref() {
            return Vec::new();
        }

        self.index.set_active(conversation_id);
        vec![ClientAction::SnapshotChanged]
    }

    /// Reset a conversation's unread counter.
    ///
    /// # Errors
    ///
    /// - `ClientError::UnknownConversation` if the conversation is not listed
    pub fn mark_read(&mut self, conversation_id: &str) -> Result<Vec<ClientAction>, ClientError> {
        if !self.index.mark_read(conversation_id) {
            return Err(ClientError::UnknownConversation(conversation_id.to_string()));
        }
        Ok(vec![ClientAction::SnapshotChanged])
    }

    /// Apply an event obtained outside the live connection.
    ///
    /// Goes through the same path as events decoded from the transport.
    pub fn ingest(&mut self, event: InboundEvent) -> Vec<ClientAction> {
        let mut out = Vec::new();
        self.apply(event, &mut out);
        self.finish(&mut out);
        out
    }

    /// Owned copy of the session state.
    pub fn snapshot(&self) -> ChatSnapshot {
        ChatSnapshot {
            connection: self.connection.state(),
            conversations: self.index.conversations().to_vec(),
            messages: self.reconciler.to_logs(),
            active_conversation: self.index.active().map(str::to_string),
            is_loading: self.loading,
        }
    }

    /// Current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Message logs.
    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// Conversation summaries.
    pub fn index(&self) -> &ConversationIndex {
        &self.index
    }

    /// Identity of the session's user.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// History page size for REST collaborators.
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Waiting for the first conversation list.
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Translate connection actions, applying delivered events on the way.
    fn absorb(&mut self, actions: Vec<ConnectionAction>) -> Vec<ClientAction> {
        let mut out = Vec::with_capacity(actions.len());
        self.absorb_into(actions, &mut out);
        self.finish(&mut out);
        out
    }

    fn absorb_into(&mut self, actions: Vec<ConnectionAction>, out: &mut Vec<ClientAction>) {
        for action in actions {
            match action {
                ConnectionAction::Open { generation, url } => {
                    out.push(ClientAction::Open { generation, url });
                },
                ConnectionAction::Transmit { generation, text } => {
                    out.push(ClientAction::Transmit { generation, text });
                },
                ConnectionAction::Close { generation } => {
                    out.push(ClientAction::CloseTransport { generation });
                },
                ConnectionAction::ScheduleTimer { timer, delay } => {
                    out.push(ClientAction::ScheduleTimer { timer, delay });
                },
                ConnectionAction::CancelTimer { timer } => {
                    out.push(ClientAction::CancelTimer { timer });
                },
                ConnectionAction::StateChanged(state) => {
                    self.dirty = true;
                    out.push(ClientAction::StateChanged(state));
                },
                ConnectionAction::Deliver(event) => self.apply(event, out),
                ConnectionAction::Report(diagnostic) => {
                    out.push(ClientAction::Report(diagnostic.into()));
                },
            }
        }
    }

    /// Pass a message through the send gate.
    ///
    /// Rejections are reported, never returned, since the optimistic entry is
    /// already in the log: a closed gate leaves it `sending`, an encode
    /// failure marks it `failed`.
    fn transmit(&mut self, message: &Message, out: &mut Vec<ClientAction>) {
        let command = OutboundCommand::SendMessage { message: message.clone() };

        match self.connection.send(&command) {
            Ok(actions) => self.absorb_into(actions, out),
            Err(
                ConnectionError::NotConnected { phase }
                | ConnectionError::InvalidState { state: phase, .. },
            ) => {
                tracing::warn!(message_id = %message.id, ?phase, "send deferred: not connected");
                out.push(ClientAction::Report(Diagnostic::SendDeferred {
                    message_id: message.id.clone(),
                    phase,
                }));
            },
            Err(ConnectionError::Encode(error)) => self.send_failed(&message.id, error, out),
        }
    }

    /// Mark an optimistic message `failed` after its command could not be
    /// built. It stays retryable.
    fn send_failed(&mut self, message_id: &str, error: EncodeError, out: &mut Vec<ClientAction>) {
        tracing::warn!(message_id, %error, "send failed");

        if let Ok(update) = self.reconciler.update_status(message_id, MessageStatus::Failed) {
            self.refresh_tail(&update.conversation_id);
            self.dirty = true;
        }
        out.push(ClientAction::Report(ConnectionDiagnostic::Encode(error).into()));
    }

    /// Apply an inbound event to the logs and the index.
    fn apply(&mut self, event: InboundEvent, out: &mut Vec<ClientAction>) {
        match event {
            InboundEvent::Conversations { conversations } => {
                let ids: Vec<String> = conversations.iter().map(|c| c.id.clone()).collect();
                self.index.replace_all(conversations);
                for id in &ids {
                    self.refresh_tail(id);
                }
                self.loading = false;
                self.dirty = true;
            },
            InboundEvent::Message { message } => {
                let from_peer = message.sender_id != self.user_id;
                let message_id = message.id.clone();

                match self.reconciler.receive(message) {
                    Received::Appended { conversation_id } => {
                        self.refresh_tail(&conversation_id);
                        if from_peer {
                            self.index.record_incoming(&conversation_id);
                        }
                        self.dirty = true;
                    },
                    Received::Confirmed { conversation_id } => {
                        self.refresh_tail(&conversation_id);
                        self.dirty = true;
                    },
                    Received::Duplicate { .. } => {
                        tracing::trace!(%message_id, "duplicate message ignored");
                    },
                    Received::Conflict { existing } => {
                        out.push(ClientAction::Report(Diagnostic::ConflictingMessage {
                            message_id,
                            existing,
                        }));
                    },
                }
            },
            InboundEvent::MessageStatus { message_id, status } => {
                match self.reconciler.update_status(&message_id, status) {
                    Ok(update) => {
                        self.refresh_tail(&update.conversation_id);
                        self.dirty = true;
                    },
                    Err(reason) => {
                        out.push(ClientAction::Report(Diagnostic::StatusIgnored {
                            message_id,
                            status,
                            reason,
                        }));
                    },
                }
            },
            InboundEvent::History { messages } => {
                let merge = self.reconciler.prepend_history(messages);
                tracing::debug!(
                    inserted = merge.inserted,
                    skipped = merge.skipped,
                    "history merged"
                );
                for conversation_id in &merge.conversations {
                    self.refresh_tail(conversation_id);
                }
                if merge.inserted > 0 {
                    self.dirty = true;
                }
            },
            InboundEvent::Unrecognized { kind } => {
                out.push(ClientAction::Report(
                    ConnectionDiagnostic::Unrecognized { kind }.into(),
                ));
            },
        }
    }

    fn refresh_tail(&mut self, conversation_id: &str) {
        if let Some(tail) = self.reconciler.tail(conversation_id) {
            self.index.sync_tail(conversation_id, tail);
        }
    }

    /// Close out an operation: signal a snapshot change if anything visible
    /// moved.
    fn finish(&mut self, out: &mut Vec<ClientAction>) {
        if std::mem::take(&mut self.dirty) {
            out.push(ClientAction::SnapshotChanged);
        }
    }

    /// `msg-{millis}-{7 base36 chars}`.
    fn message_id(&self, millis: i64) -> String {
        const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

        let mut random = self.env.random_u64();
        let mut suffix = String::with_capacity(MESSAGE_ID_SUFFIX_LEN);
        for _ in 0..MESSAGE_ID_SUFFIX_LEN {
            suffix.push(char::from(DIGITS[(random % 36) as usize]));
            random /= 36;
        }

        format!("msg-{millis}-{suffix}")
    }
}
