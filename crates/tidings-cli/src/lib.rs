//! Terminal client for Tidings
//!
//! A line-oriented front end over [`tidings_app::SessionHandle`]. The binary
//! wires the WebSocket transport and the system environment to a runtime;
//! everything user-facing lives here so it can run against a simulated
//! session in tests.
//!
//! # Components
//!
//! - [`Args`]: Command-line arguments and their environment fallbacks
//! - [`Command`]: Parsed input lines
//! - [`Shell`]: Input loop and rendering of session updates
//! - [`Output`]: The only writer of user-facing text

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod args;
pub mod command;
pub mod output;
pub mod shell;

pub use args::Args;
pub use command::{Command, CommandError};
pub use output::Output;
pub use shell::{Shell, ShellError};
