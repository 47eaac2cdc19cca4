//! Codec errors.

use thiserror::Error;

/// Inbound frame could not be turned into an [`crate::InboundEvent`].
///
/// Every variant keeps the raw payload so the failure can be reported
/// verbatim. Decode errors never affect connection state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Payload is not valid JSON
    #[error("malformed JSON: {reason}")]
    Json {
        /// Parser message
        reason: String,
        /// Offending payload
        raw: String,
    },

    /// Payload is JSON but not an object with a string `type` field
    #[error("envelope has no string `type` discriminator")]
    MissingType {
        /// Offending payload
        raw: String,
    },

    /// Known envelope type with a payload that does not match its shape
    #[error("invalid `{kind}` envelope: {reason}")]
    InvalidEnvelope {
        /// Envelope `type`
        kind: String,
        /// Parser message
        reason: String,
        /// Offending payload
        raw: String,
    },
}

impl DecodeError {
    /// The payload that failed to decode.
    pub fn raw(&self) -> &str {
        match self {
            Self::Json { raw, .. }
            | Self::MissingType { raw }
            | Self::InvalidEnvelope { raw, .. } => raw,
        }
    }
}

/// Outbound value could not be serialized.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("failed to encode `{kind}` envelope: {reason}")]
pub struct EncodeError {
    /// Envelope `type`
    pub kind: String,
    /// Serializer message
    pub reason: String,
}
