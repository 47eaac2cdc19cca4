//! Tidings protocol
//!
//! Wire representation of the chat protocol: the data model shared by client
//! and server, and the JSON envelope codec that maps text frames to a closed
//! set of typed events.
//!
//! # Envelope
//!
//! Every frame is a JSON object discriminated by its `type` field. Outbound
//! frames are [`OutboundCommand`]s, inbound frames decode into
//! [`InboundEvent`]s. An inbound `type` the codec does not know is not an
//! error: it decodes to [`InboundEvent::Unrecognized`] so the caller can
//! report it and move on.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod envelope;
pub mod errors;
mod model;

pub use envelope::{InboundEvent, OutboundCommand};
pub use errors::{DecodeError, EncodeError};
pub use model::{ChatUser, Conversation, Message, MessageKind, MessageStatus, Metadata};
