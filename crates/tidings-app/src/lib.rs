//! Application layer for Tidings
//!
//! Async runtime that drives the pure [`tidings_client::Client`] state
//! machine: it owns the transport and the backoff timers, executes the
//! client's actions, and publishes state to consumers.
//!
//! # Components
//!
//! - [`Runtime`]: Single serialized event loop for one session
//! - [`SessionHandle`]: Cloneable handle for issuing commands and observing
//!   state
//! - [`Transport`]: Seam for the duplex connection (WebSocket in production,
//!   simulated in tests)
//! - [`SystemEnv`]: Production environment (system clock, OS entropy)
//!
//! # Transport (optional)
//!
//! With the `websocket` feature enabled, [`websocket::WebSocketTransport`]
//! connects with `tokio-tungstenite`.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod error;
mod handle;
mod runtime;
mod system_env;
mod transport;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use error::RuntimeError;
pub use handle::SessionHandle;
pub use runtime::Runtime;
pub use system_env::SystemEnv;
pub use tidings_client::{ChatSnapshot, ClientConfig, ConnectionPhase, ConnectionState, Diagnostic};
pub use transport::{Transport, TransportHandle, TransportSink};
