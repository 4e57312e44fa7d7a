//! # Error Definitions
//!
//! Failures of the codec itself. Whether a failure is fatal is the peer's call;
//! from here every one of them is just "this frame could not be read".

/// Codec failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The bytes are not a JSON document.
    Malformed(String),
    /// The document has no string `type` field.
    MissingType,
    /// The `type` field names a message this protocol does not define.
    UnknownType(String),
    /// The message type is known but its fields do not match the schema.
    InvalidMessage { kind: String, details: String },
    /// Serialization of an outbound message failed.
    Encode(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed(e) => write!(f, "malformed frame: {}", e),
            Self::MissingType => write!(f, "frame has no message type"),
            Self::UnknownType(tag) => write!(f, "unknown message type '{}'", tag),
            Self::InvalidMessage { kind, details } => write!(f, "invalid '{}' message: {}", kind, details),
            Self::Encode(e) => write!(f, "failed to encode message: {}", e),
        }
    }
}

impl std::error::Error for Error {}

/// A specialized Result type for codec operations.
pub type Result<T> = std::result::Result<T, Error>;
