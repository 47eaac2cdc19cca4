//! Client
//!
//! Action-based state machine for one chat session. Combines the connection
//! lifecycle from [`tidings_core`] with the message log and conversation
//! summaries the UI reads.
//!
//! # Architecture
//!
//! The client follows the same Sans-IO and action-based patterns as
//! [`tidings_core`]. It receives events ([`ClientEvent`]), processes them
//! through pure state machine logic, and returns actions ([`ClientAction`])
//! for the caller to execute. The caller owns sockets and timers and reads
//! state through [`Client::snapshot`].
//!
//! # Components
//!
//! - [`Client`]: Top-level state machine for a session
//! - [`Reconciler`]: Per-conversation message logs, optimistic inserts and
//!   server reconciliation
//! - [`ConversationIndex`]: Conversation summaries derived from the logs
//! - [`ChatSnapshot`]: Owned, read-only view of the whole session

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod client;
mod diagnostic;
mod error;
mod event;
mod index;
mod reconciler;
mod snapshot;

pub use client::Client;
pub use diagnostic::{Diagnostic, StatusRejection};
pub use error::{ClientError, ReconcileError};
pub use event::{ClientAction, ClientEvent};
pub use index::ConversationIndex;
pub use reconciler::{HistoryMerge, Received, Reconciler, StatusUpdate};
pub use snapshot::ChatSnapshot;
pub use tidings_core::{
    ClientConfig, ConnectionPhase, ConnectionState, Environment, Generation, TimerId,
    TransportEvent,
};
