//! Tidings core
//!
//! Sans-IO building blocks for a chat session: the connection lifecycle state
//! machine, its reconnect policy, and the environment abstraction that keeps
//! both deterministic under test.
//!
//! # Architecture
//!
//! Nothing in this crate performs I/O. [`ConnectionManager`] takes transport
//! events and timer expirations as input and returns
//! [`ConnectionAction`]s for a driver to execute (open a socket, write a
//! frame, arm a timer). The driver owns sockets and timers; the manager owns
//! the decisions.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod backoff;
pub mod config;
pub mod connection;
pub mod env;
pub mod error;

pub use backoff::{Backoff, BackoffDecision};
pub use config::ClientConfig;
pub use connection::{
    ConnectionAction, ConnectionManager, ConnectionPhase, ConnectionState, Generation, TimerId,
    TransportEvent,
};
pub use env::Environment;
pub use error::{ConfigError, ConnectionDiagnostic, ConnectionError, TransportError};
