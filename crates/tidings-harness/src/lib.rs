//! Deterministic simulation harness for Tidings sessions.
//!
//! Simulated implementations of the Environment and Transport seams so whole
//! sessions (runtime, client, timers) run under tokio's paused clock with
//! reproducible randomness.
//!
//! # Invariant Testing
//!
//! The `invariants` module checks properties that must hold across every
//! recorded session history rather than specific scenarios. Use
//! [`InvariantRegistry::standard()`] for the common set.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod invariants;
pub mod sim_env;
pub mod sim_session;
pub mod sim_transport;

pub use invariants::{
    ConnectionAttemptsBounded, Invariant, InvariantRegistry, InvariantResult, MessagesNeverVanish,
    SessionTrace, StatusProgression, UniqueMessageIds, Violation,
};
pub use sim_env::SimEnv;
pub use sim_session::SimSession;
pub use sim_transport::SimTransport;
