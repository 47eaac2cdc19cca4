//! Client errors.

use thiserror::Error;
use tidings_core::{ConfigError, ConnectionError};
use tidings_proto::MessageStatus;

/// Errors from message log operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    /// No message with this ID in any log
    #[error("unknown message: {0}")]
    UnknownMessage(String),

    /// Operation not valid for the message's current status
    #[error("invalid state: cannot {operation} message {message_id} in status {status}")]
    InvalidState {
        /// Target message
        message_id: String,
        /// Its current status
        status: MessageStatus,
        /// Operation that was attempted
        operation: &'static str,
    },

    /// A message with this ID already exists
    #[error("duplicate message id: {0}")]
    DuplicateMessage(String),
}

/// Errors returned synchronously by [`crate::Client`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Connection lifecycle error
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Message log error
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    /// Invalid configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Conversation not present in the conversation list
    #[error("unknown conversation: {0}")]
    UnknownConversation(String),
}
