//! Session handle.
//!
//! Consumers never touch the runtime directly. Commands go through an mpsc
//! channel and are answered on a oneshot; state is observed through watch
//! channels, which always hold the latest value; diagnostics are broadcast.

use std::sync::Arc;

use tidings_client::{ChatSnapshot, ClientError, ConnectionState, Diagnostic};
use tidings_proto::{InboundEvent, Message};
use tokio::sync::{broadcast, mpsc, oneshot, watch};

use crate::error::RuntimeError;

type Reply<T> = oneshot::Sender<Result<T, ClientError>>;

/// Commands from handles to the runtime.
#[derive(Debug)]
pub(crate) enum Command {
    Start { reply: Reply<()> },
    Stop { reply: Reply<()> },
    ForceReconnect { reply: Reply<()> },
    SendMessage { conversation_id: String, content: String, reply: Reply<Message> },
    Retry { message_id: String, reply: Reply<()> },
    SelectConversation { conversation_id: Option<String>, reply: Reply<()> },
    MarkRead { conversation_id: String, reply: Reply<()> },
    Ingest { event: InboundEvent, reply: Reply<()> },
    Shutdown,
}

/// Cloneable handle to a running session.
///
/// Every method that mutates the session waits until the runtime has applied
/// the command, so a snapshot read right after an `await` reflects it.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<ConnectionState>,
    snapshot: watch::Receiver<Arc<ChatSnapshot>>,
    diagnostics: broadcast::Sender<Diagnostic>,
    page_size: u32,
}

impl SessionHandle {
    pub(crate) fn new(
        commands: mpsc::Sender<Command>,
        state: watch::Receiver<ConnectionState>,
        snapshot: watch::Receiver<Arc<ChatSnapshot>>,
        diagnostics: broadcast::Sender<Diagnostic>,
        page_size: u32,
    ) -> Self {
        Self { commands, state, snapshot, diagnostics, page_size }
    }

    /// Connect for the first time.
    ///
    /// # Errors
    ///
    /// - `RuntimeError::Client` if the session was already started
    /// - `RuntimeError::Stopped` if the runtime has exited
    pub async fn start(&self) -> Result<(), RuntimeError> {
        self.request(|reply| Command::Start { reply }).await
    }

    /// Stop the session: cancel any pending reconnect and close the
    /// connection. Idempotent.
    ///
    /// # Errors
    ///
    /// - `RuntimeError::Stopped` if the runtime has exited
    pub async fn stop(&self) -> Result<(), RuntimeError> {
        self.request(|reply| Command::Stop { reply }).await
    }

    /// Drop the current connection and connect again with a fresh attempt
    /// count. Also revives a closed session.
    ///
    /// # Errors
    ///
    /// - `RuntimeError::Stopped` if the runtime has exited
    pub async fn force_reconnect(&self) -> Result<(), RuntimeError> {
        self.request(|reply| Command::ForceReconnect { reply }).await
    }

    /// Send a text message. The returned message is the optimistic entry
    /// already visible in the snapshot.
    ///
    /// # Errors
    ///
    /// - `RuntimeError::Client` if the message could not be encoded
    /// - `RuntimeError::Stopped` if the runtime has exited
    pub async fn send_message(
        &self,
        conversation_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<Message, RuntimeError> {
        let conversation_id = conversation_id.into();
        let content = content.into();
        self.request(|reply| Command::SendMessage { conversation_id, content, reply }).await
    }

    /// Resend a failed message under its original ID.
    ///
    /// # Errors
    ///
    /// - `RuntimeError::Client` if the message is unknown or not failed
    /// - `RuntimeError::Stopped` if the runtime has exited
    pub async fn retry(&self, message_id: impl Into<String>) -> Result<(), RuntimeError> {
        let message_id = message_id.into();
        self.request(|reply| Command::Retry { message_id, reply }).await
    }

    /// Set (or clear) the active conversation.
    ///
    /// # Errors
    ///
    /// - `RuntimeError::Stopped` if the runtime has exited
    pub async fn select_conversation(
        &self,
        conversation_id: Option<String>,
    ) -> Result<(), RuntimeError> {
        self.request(|reply| Command::SelectConversation { conversation_id, reply }).await
    }

    /// Reset a conversation's unread count.
    ///
    /// # Errors
    ///
    /// - `RuntimeError::Client` if the conversation is unknown
    /// - `RuntimeError::Stopped` if the runtime has exited
    pub async fn mark_read(&self, conversation_id: impl Into<String>) -> Result<(), RuntimeError> {
        let conversation_id = conversation_id.into();
        self.request(|reply| Command::MarkRead { conversation_id, reply }).await
    }

    /// Apply an inbound event as if the server had sent it.
    ///
    /// # Errors
    ///
    /// - `RuntimeError::Stopped` if the runtime has exited
    pub async fn ingest(&self, event: InboundEvent) -> Result<(), RuntimeError> {
        self.request(|reply| Command::Ingest { event, reply }).await
    }

    /// Stop the session and end the runtime loop.
    ///
    /// # Errors
    ///
    /// - `RuntimeError::Stopped` if the runtime had already exited
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.commands.send(Command::Shutdown).await.map_err(|_| RuntimeError::Stopped)
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> Arc<ChatSnapshot> {
        Arc::clone(&self.snapshot.borrow())
    }

    /// Receiver that wakes on every connection state change.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Receiver that wakes on every snapshot change.
    pub fn watch_snapshot(&self) -> watch::Receiver<Arc<ChatSnapshot>> {
        self.snapshot.clone()
    }

    /// Subscribe to diagnostics reported from now on.
    pub fn subscribe_diagnostics(&self) -> broadcast::Receiver<Diagnostic> {
        self.diagnostics.subscribe()
    }

    /// History page size from the configuration.
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, RuntimeError> {
        let (reply, response) = oneshot::channel();
        self.commands.send(command(reply)).await.map_err(|_| RuntimeError::Stopped)?;
        let result = response.await.map_err(|_| RuntimeError::Stopped)?;
        Ok(result?)
    }
}
