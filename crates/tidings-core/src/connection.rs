//! Connection lifecycle state machine.
//!
//! Owns the decision of when to open, close and reopen the transport. Uses
//! the action pattern: methods take transport events and timer expirations as
//! input and return [`ConnectionAction`]s for the driver to execute. The
//! manager never touches a socket or a clock.
//!
//! # State Machine
//!
//! ```text
//!                 start / forceReconnect
//! ┌──────────────┐          ┌────────────┐   opened    ┌───────────┐
//! │ Disconnected │─────────>│ Connecting │────────────>│ Connected │
//! └──────────────┘          └────────────┘             └───────────┘
//!                             ↑        │ close/error        │ close/error
//!                 timer fires │        ↓                    ↓
//!                           ┌──────────────┐  attempts  ┌────────┐
//!                           │ Reconnecting │───────────>│ Closed │
//!                           └──────────────┘  exhausted └────────┘
//! ```
//!
//! `stop()` moves any phase to `Closed`. `force_reconnect()` re-enters
//! `Connecting` from any phase, including `Closed`.
//!
//! # Generations
//!
//! Every transport the manager opens gets a fresh [`Generation`]. Events are
//! tagged with the generation they came from and anything not from the live
//! generation is discarded, so a late close from a superseded socket can never
//! tear down its replacement.

use std::{fmt, time::Duration};

use tidings_proto::{InboundEvent, OutboundCommand};

use crate::{
    backoff::{Backoff, BackoffDecision},
    config::ClientConfig,
    error::{ConfigError, ConnectionDiagnostic, ConnectionError, TransportError},
};

/// Identifies one transport instance opened by the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    /// Raw generation number.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifies one backoff timer armed by the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

impl TimerId {
    /// Raw timer number.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer-{}", self.0)
    }
}

/// Lifecycle phase of the session's connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionPhase {
    /// Not started
    Disconnected,
    /// Transport opening
    Connecting,
    /// Transport open, `init` sent
    Connected,
    /// Waiting for the backoff timer before the next attempt
    Reconnecting,
    /// Stopped, or reconnect attempts exhausted
    Closed,
}

/// Connection state as seen by observers.
///
/// A fresh value is produced on every transition; observers compare whole
/// values rather than watching fields change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionState {
    /// Current phase
    pub phase: ConnectionPhase,
    /// Reconnect attempt in progress or scheduled. Zero while connected and
    /// during the first connection.
    pub attempt: u32,
}

impl ConnectionState {
    const DISCONNECTED: Self = Self { phase: ConnectionPhase::Disconnected, attempt: 0 };

    /// Whether the send gate is open.
    pub fn is_connected(self) -> bool {
        self.phase == ConnectionPhase::Connected
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::DISCONNECTED
    }
}

/// Events a transport reports for the connection it owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Connection established
    Opened,
    /// Text frame received
    Frame(String),
    /// Connection closed by the peer or the network
    Closed {
        /// Close reason, if the peer gave one
        reason: Option<String>,
    },
    /// Connection failed; no further events follow
    Failed(TransportError),
}

/// Actions returned by the connection manager.
///
/// The driver executes these in order:
/// - `Open`: start a transport for `url` tagged with `generation`
/// - `Transmit`: write a text frame to that transport
/// - `Close`: tear that transport down
/// - `ScheduleTimer` / `CancelTimer`: arm or disarm a backoff timer
/// - `StateChanged`, `Deliver`, `Report`: hand results to the layer above
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionAction {
    /// Open a new transport
    Open {
        /// Tag for every event the transport reports
        generation: Generation,
        /// Endpoint including query credentials
        url: String,
    },

    /// Write a frame to the live transport
    Transmit {
        /// Transport to write to
        generation: Generation,
        /// Encoded envelope
        text: String,
    },

    /// Close a transport
    Close {
        /// Transport to close
        generation: Generation,
    },

    /// Arm a timer that reports back through `handle_timer`
    ScheduleTimer {
        /// Timer identity
        timer: TimerId,
        /// Delay until it fires
        delay: Duration,
    },

    /// Disarm a previously scheduled timer
    CancelTimer {
        /// Timer identity
        timer: TimerId,
    },

    /// Connection state was replaced
    StateChanged(ConnectionState),

    /// Decoded inbound event for the layer above
    Deliver(InboundEvent),

    /// Non-fatal condition worth surfacing
    Report(ConnectionDiagnostic),
}

/// Connection lifecycle manager for one chat session.
///
/// Pure state machine. Holds the only reference to the live transport
/// (by generation) and the only pending backoff timer, so there is at most
/// one of each at any time.
#[derive(Debug, Clone)]
pub struct ConnectionManager {
    state: ConnectionState,
    backoff: Backoff,
    url: String,
    user_id: String,
    /// Transport the manager currently owns
    live: Option<Generation>,
    /// Backoff timer currently armed
    timer: Option<TimerId>,
    next_generation: u64,
    next_timer: u64,
}

impl ConnectionManager {
    /// Create a manager in [`ConnectionPhase::Disconnected`].
    ///
    /// # Errors
    ///
    /// Returns the first problem [`ClientConfig::validate`] finds.
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let url = config.connect_url()?;

        Ok(Self {
            state: ConnectionState::DISCONNECTED,
            backoff: Backoff::from_config(config),
            url: url.into(),
            user_id: config.user_id.clone(),
            live: None,
            timer: None,
            next_generation: 0,
            next_timer: 0,
        })
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Generation of the transport currently owned. `None` when no transport
    /// is open or opening.
    pub fn live_generation(&self) -> Option<Generation> {
        self.live
    }

    /// Backoff timer currently armed, if any.
    pub fn pending_timer(&self) -> Option<TimerId> {
        self.timer
    }

    /// Endpoint the manager connects to.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Begin the first connection attempt.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::InvalidState` unless the manager is `Disconnected`.
    ///   A `Closed` manager restarts through [`Self::force_reconnect`].
    pub fn start(&mut self) -> Result<Vec<ConnectionAction>, ConnectionError> {
        if self.state.phase != ConnectionPhase::Disconnected {
            return Err(ConnectionError::InvalidState {
                state: self.state.phase,
                operation: "start".to_string(),
            });
        }

        let mut actions = Vec::new();
        self.open(0, &mut actions);
        Ok(actions)
    }

    /// Stop the session. Idempotent.
    ///
    /// Cancels the backoff timer, closes the transport if one is open and
    /// moves to `Closed`. Events still in flight from the closed transport
    /// will be discarded as stale.
    pub fn stop(&mut self) -> Vec<ConnectionAction> {
        if self.state.phase == ConnectionPhase::Closed {
            return Vec::new();
        }

        let mut actions = Vec::new();
        self.release(&mut actions);
        self.transition(ConnectionPhase::Closed, self.state.attempt, &mut actions);
        actions
    }

    /// Drop whatever is in progress and connect again with a fresh attempt
    /// counter. Valid from every phase, including `Closed`.
    pub fn force_reconnect(&mut self) -> Vec<ConnectionAction> {
        let mut actions = Vec::new();
        self.release(&mut actions);
        self.open(0, &mut actions);
        actions
    }

    /// Process an event reported by the transport tagged `generation`.
    ///
    /// Events from any transport other than the live one are discarded.
    pub fn handle_transport(
        &mut self,
        generation: Generation,
        event: TransportEvent,
    ) -> Vec<ConnectionAction> {
        if self.live != Some(generation) {
            tracing::debug!(%generation, live = ?self.live, "discarding stale transport event");
            return vec![ConnectionAction::Report(ConnectionDiagnostic::StaleEvent {
                generation,
                live: self.live,
            })];
        }

        let mut actions = Vec::new();

        match event {
            TransportEvent::Opened => {
                if self.state.phase == ConnectionPhase::Connecting {
                    self.transition(ConnectionPhase::Connected, 0, &mut actions);

                    let init = OutboundCommand::Init { user_id: self.user_id.clone() };
                    match init.encode() {
                        Ok(text) => actions.push(ConnectionAction::Transmit { generation, text }),
                        Err(e) => {
                            actions.push(ConnectionAction::Report(ConnectionDiagnostic::Encode(e)));
                        },
                    }
                }
            },
            TransportEvent::Frame(text) => match InboundEvent::decode(&text) {
                Ok(InboundEvent::Unrecognized { kind }) => {
                    actions.push(ConnectionAction::Report(ConnectionDiagnostic::Unrecognized {
                        kind,
                    }));
                },
                Ok(event) => actions.push(ConnectionAction::Deliver(event)),
                Err(e) => actions.push(ConnectionAction::Report(ConnectionDiagnostic::Decode(e))),
            },
            TransportEvent::Closed { reason } => {
                tracing::debug!(%generation, ?reason, "transport closed");
                self.connection_lost(generation, &mut actions);
            },
            TransportEvent::Failed(error) => {
                tracing::debug!(
                    %generation,
                    %error,
                    transient = error.is_transient(),
                    "transport failed"
                );
                actions.push(ConnectionAction::Report(ConnectionDiagnostic::Transport {
                    generation,
                    error,
                }));
                self.connection_lost(generation, &mut actions);
            },
        }

        actions
    }

    /// Process expiry of a backoff timer.
    ///
    /// Only the currently armed timer has an effect; anything else is stale.
    pub fn handle_timer(&mut self, timer: TimerId) -> Vec<ConnectionAction> {
        if self.timer != Some(timer) {
            return vec![ConnectionAction::Report(ConnectionDiagnostic::StaleTimer { timer })];
        }

        self.timer = None;

        let mut actions = Vec::new();
        if self.state.phase == ConnectionPhase::Reconnecting {
            self.open(self.state.attempt, &mut actions);
        }
        actions
    }

    /// Send gate: encode `command` for the live transport.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::NotConnected` unless the phase is `Connected`
    /// - `ConnectionError::Encode` if the command cannot be serialized
    pub fn send(
        &mut self,
        command: &OutboundCommand,
    ) -> Result<Vec<ConnectionAction>, ConnectionError> {
        let (ConnectionPhase::Connected, Some(generation)) = (self.state.phase, self.live) else {
            return Err(ConnectionError::NotConnected { phase: self.state.phase });
        };

        let text = command.encode()?;
        Ok(vec![ConnectionAction::Transmit { generation, text }])
    }

    /// Open a new transport and enter `Connecting` for `attempt`.
    fn open(&mut self, attempt: u32, actions: &mut Vec<ConnectionAction>) {
        self.next_generation += 1;
        let generation = Generation(self.next_generation);
        self.live = Some(generation);

        self.transition(ConnectionPhase::Connecting, attempt, actions);
        actions.push(ConnectionAction::Open { generation, url: self.url.clone() });
    }

    /// Cancel the pending timer and close the live transport, if any.
    fn release(&mut self, actions: &mut Vec<ConnectionAction>) {
        if let Some(timer) = self.timer.take() {
            actions.push(ConnectionAction::CancelTimer { timer });
        }

        if let Some(generation) = self.live.take() {
            actions.push(ConnectionAction::Close { generation });
        }
    }

    /// The live transport closed or failed: retry or give up.
    fn connection_lost(&mut self, generation: Generation, actions: &mut Vec<ConnectionAction>) {
        self.live = None;
        actions.push(ConnectionAction::Close { generation });

        let attempts_made = self.state.attempt;
        match self.backoff.next(attempts_made) {
            BackoffDecision::Retry { attempt, delay } => {
                self.next_timer += 1;
                let timer = TimerId(self.next_timer);
                self.timer = Some(timer);

                tracing::debug!(
                    %timer,
                    attempt,
                    max_attempts = self.backoff.max_attempts(),
                    "reconnect scheduled"
                );
                self.transition(ConnectionPhase::Reconnecting, attempt, actions);
                actions.push(ConnectionAction::ScheduleTimer { timer, delay });
            },
            BackoffDecision::GiveUp => {
                self.transition(ConnectionPhase::Closed, attempts_made, actions);
                if self.backoff.is_enabled() {
                    actions.push(ConnectionAction::Report(
                        ConnectionDiagnostic::ReconnectExhausted { attempts: attempts_made },
                    ));
                }
            },
        }
    }

    fn transition(
        &mut self,
        phase: ConnectionPhase,
        attempt: u32,
        actions: &mut Vec<ConnectionAction>,
    ) {
        let next = ConnectionState { phase, attempt };
        debug_assert!(
            next != self.state || phase == ConnectionPhase::Connecting,
            "transition must change state"
        );

        tracing::debug!(from = ?self.state.phase, to = ?phase, attempt, "connection transition");
        self.state = next;
        actions.push(ConnectionAction::StateChanged(next));
    }
}
