//! Runtime errors.

use thiserror::Error;
use tidings_client::ClientError;

/// Errors returned through a [`crate::SessionHandle`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// The runtime loop has exited; the session can no longer be driven.
    #[error("session runtime has stopped")]
    Stopped,

    /// The client rejected the operation.
    #[error(transparent)]
    Client(#[from] ClientError),
}
