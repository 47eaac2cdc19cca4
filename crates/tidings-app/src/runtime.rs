//! Session runtime.
//!
//! The Runtime is the one place where a session's state changes. Commands
//! from [`SessionHandle`]s, transport events and timer expirations all arrive
//! on channels and are handled one at a time by [`Runtime::run`], so the
//! client state machine never sees concurrent input.

use std::{collections::HashMap, sync::Arc};

use tidings_client::{
    ChatSnapshot, Client, ClientAction, ClientConfig, ClientError, ConnectionPhase,
    ConnectionState, Diagnostic, Environment, Generation, TimerId,
};
use tokio::{
    sync::{broadcast, mpsc, watch},
    task::JoinHandle,
};

use crate::{
    error::RuntimeError,
    handle::{Command, SessionHandle},
    transport::{Input, Transport, TransportHandle, TransportSink},
};

/// Pending commands from handles.
const COMMAND_CAPACITY: usize = 64;

/// Pending transport events and timer expirations.
const INPUT_CAPACITY: usize = 256;

/// Diagnostics buffered per subscriber before the oldest are dropped.
const DIAGNOSTIC_CAPACITY: usize = 128;

/// Event loop for one chat session.
///
/// # Type Parameters
///
/// - `T`: Transport that opens connections
/// - `E`: Environment for time, randomness and timers
pub struct Runtime<T, E>
where
    T: Transport,
    E: Environment,
{
    client: Client<E>,
    env: E,
    transport: T,
    commands: mpsc::Receiver<Command>,
    inputs: mpsc::Receiver<Input>,
    inputs_tx: mpsc::Sender<Input>,
    /// Live connection, tagged with its generation
    connection: Option<(Generation, TransportHandle)>,
    timers: HashMap<TimerId, JoinHandle<()>>,
    /// When the current connection attempt started
    connecting_since: Option<E::Instant>,
    state_tx: watch::Sender<ConnectionState>,
    snapshot_tx: watch::Sender<Arc<ChatSnapshot>>,
    diagnostics_tx: broadcast::Sender<Diagnostic>,
}

impl<T, E> Runtime<T, E>
where
    T: Transport,
    E: Environment,
{
    /// Create a runtime and the handle that controls it.
    ///
    /// The session does not connect until [`SessionHandle::start`] is called
    /// and [`Runtime::run`] is being polled.
    ///
    /// # Errors
    ///
    /// - `RuntimeError::Client` if the configuration is invalid
    pub fn new(
        config: &ClientConfig,
        env: E,
        transport: T,
    ) -> Result<(Self, SessionHandle), RuntimeError> {
        let client = Client::new(env.clone(), config)?;

        let (commands_tx, commands) = mpsc::channel(COMMAND_CAPACITY);
        let (inputs_tx, inputs) = mpsc::channel(INPUT_CAPACITY);
        let (state_tx, state_rx) = watch::channel(client.connection_state());
        let (snapshot_tx, snapshot_rx) = watch::channel(Arc::new(client.snapshot()));
        let (diagnostics_tx, _) = broadcast::channel(DIAGNOSTIC_CAPACITY);

        let handle = SessionHandle::new(
            commands_tx,
            state_rx,
            snapshot_rx,
            diagnostics_tx.clone(),
            client.page_size(),
        );

        let runtime = Self {
            client,
            env,
            transport,
            commands,
            inputs,
            inputs_tx,
            connection: None,
            timers: HashMap::new(),
            connecting_since: None,
            state_tx,
            snapshot_tx,
            diagnostics_tx,
        };

        Ok((runtime, handle))
    }

    /// Run until [`SessionHandle::shutdown`] is called or every handle is
    /// dropped. The session is stopped on the way out.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },

                Some(input) = self.inputs.recv() => self.handle_input(input),
            }
        }

        let actions = self.client.stop();
        self.execute(actions);

        for (_, timer) in self.timers.drain() {
            timer.abort();
        }

        tracing::debug!("session runtime exited");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Start { reply } => {
                let result = self.client.start();
                let _ = reply.send(self.settle(result));
            },
            Command::Stop { reply } => {
                let actions = self.client.stop();
                self.execute(actions);
                let _ = reply.send(Ok(()));
            },
            Command::ForceReconnect { reply } => {
                let actions = self.client.force_reconnect();
                self.execute(actions);
                let _ = reply.send(Ok(()));
            },
            Command::SendMessage { conversation_id, content, reply } => {
                let result = match self.client.send_message(&conversation_id, content) {
                    Ok((message, actions)) => {
                        self.execute(actions);
                        Ok(message)
                    },
                    Err(e) => Err(e),
                };
                let _ = reply.send(result);
            },
            Command::Retry { message_id, reply } => {
                let result = self.client.retry(&message_id);
                let _ = reply.send(self.settle(result));
            },
            Command::SelectConversation { conversation_id, reply } => {
                let actions = self.client.select_conversation(conversation_id);
                self.execute(actions);
                let _ = reply.send(Ok(()));
            },
            Command::MarkRead { conversation_id, reply } => {
                let result = self.client.mark_read(&conversation_id);
                let _ = reply.send(self.settle(result));
            },
            Command::Ingest { event, reply } => {
                let actions = self.client.ingest(event);
                self.execute(actions);
                let _ = reply.send(Ok(()));
            },
            Command::Shutdown => {},
        }
    }

    fn handle_input(&mut self, input: Input) {
        let actions = match input {
            Input::Transport { generation, event } => {
                self.client.handle_transport(generation, event)
            },
            Input::Timer(timer) => {
                self.timers.remove(&timer);
                self.client.handle_timer(timer)
            },
        };
        self.execute(actions);
    }

    /// Execute the actions of a fallible operation and strip them from its
    /// result.
    fn settle(
        &mut self,
        result: Result<Vec<ClientAction>, ClientError>,
    ) -> Result<(), ClientError> {
        let actions = result?;
        self.execute(actions);
        Ok(())
    }

    /// Execute client actions in order.
    fn execute(&mut self, actions: Vec<ClientAction>) {
        for action in actions {
            match action {
                ClientAction::Open { generation, url } => self.open(generation, &url),
                ClientAction::Transmit { generation, text } => self.transmit(generation, text),
                ClientAction::CloseTransport { generation } => {
                    if matches!(&self.connection, Some((live, _)) if *live == generation)
                        && let Some((_, handle)) = self.connection.take()
                    {
                        tracing::debug!(%generation, "closing transport");
                        handle.close();
                    }
                },
                ClientAction::ScheduleTimer { timer, delay } => {
                    let inputs = self.inputs_tx.clone();
                    let env = self.env.clone();
                    let task = tokio::spawn(async move {
                        env.sleep(delay).await;
                        let _ = inputs.send(Input::Timer(timer)).await;
                    });

                    tracing::debug!(%timer, ?delay, "backoff timer armed");
                    if let Some(previous) = self.timers.insert(timer, task) {
                        previous.abort();
                    }
                },
                ClientAction::CancelTimer { timer } => {
                    if let Some(task) = self.timers.remove(&timer) {
                        tracing::debug!(%timer, "backoff timer cancelled");
                        task.abort();
                    }
                },
                ClientAction::StateChanged(state) => self.publish_state(state),
                ClientAction::SnapshotChanged => {
                    self.snapshot_tx.send_replace(Arc::new(self.client.snapshot()));
                },
                ClientAction::Report(diagnostic) => {
                    if diagnostic.is_failure() {
                        tracing::warn!(%diagnostic, "session diagnostic");
                    } else {
                        tracing::debug!(%diagnostic, "session diagnostic");
                    }
                    // No subscribers is fine
                    let _ = self.diagnostics_tx.send(diagnostic);
                },
            }
        }
    }

    fn open(&mut self, generation: Generation, url: &str) {
        tracing::info!(%generation, "opening transport");

        let sink = TransportSink::new(generation, self.inputs_tx.clone());
        let handle = self.transport.open(url, sink);

        if let Some((previous, old)) = self.connection.replace((generation, handle)) {
            tracing::debug!(%previous, "replacing transport");
            old.close();
        }
        self.connecting_since = Some(self.env.now());
    }

    /// Hand a frame to the live connection. Never waits: a full queue drops
    /// the frame and reports it.
    fn transmit(&mut self, generation: Generation, text: String) {
        let result = match &self.connection {
            Some((live, handle)) if *live == generation => handle.send(text),
            _ => {
                tracing::debug!(%generation, "no live transport; frame dropped");
                return;
            },
        };

        if let Err(error) = result {
            tracing::warn!(%generation, %error, "outbound frame dropped");
            let _ = self.diagnostics_tx.send(Diagnostic::FrameDropped { generation, error });
        }
    }

    fn publish_state(&mut self, state: ConnectionState) {
        match state.phase {
            ConnectionPhase::Connected => {
                if let Some(started) = self.connecting_since.take() {
                    let elapsed = self.env.now() - started;
                    tracing::info!(?elapsed, "connected");
                }
            },
            ConnectionPhase::Reconnecting => {
                tracing::info!(attempt = state.attempt, "connection lost; reconnect scheduled");
            },
            ConnectionPhase::Closed => tracing::info!(attempt = state.attempt, "session closed"),
            ConnectionPhase::Disconnected | ConnectionPhase::Connecting => {
                tracing::debug!(phase = ?state.phase, attempt = state.attempt, "connection state");
            },
        }

        self.state_tx.send_replace(state);
    }
}
