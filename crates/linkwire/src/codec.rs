//! # Byte Codec
//!
//! JSON framing for messages. One message per buffer; how buffers are
//! delimited on a stream is the transport's concern.
//!
//! ## Invariants
//! - **Panic Safety**: All decoding paths return `Result`, never panicking on unknown data.
//! - **Forward Compatibility**: Unknown fields inside a known message are ignored.

use crate::error::Error;
use crate::error::Result;
use crate::message::Message;

/// Every message type this protocol defines.
pub const MESSAGE_TYPES: [&str; 5] = ["param", "apply", "result", "finalize", "oob"];

/// Encodes a message into a freshly allocated buffer.
pub fn encode(message: &Message) -> Result<Vec<u8>> {
    serde_json::to_vec(message).map_err(|e| Error::Encode(e.to_string()))
}

/// Decodes a message, classifying failures as malformed bytes, unknown
/// message types, or known types with invalid fields.
pub fn decode(bytes: &[u8]) -> Result<Message> {
    let raw: serde_json::Value = serde_json::from_slice(bytes)
        .map_err(|e| Error::Malformed(e.to_string()))?;

    let kind = match raw.get("type").and_then(|t| t.as_str()) {
        Some(kind) => kind.to_string(),
        None => return Err(Error::MissingType),
    };

    if !MESSAGE_TYPES.contains(&kind.as_str()) {
        return Err(Error::UnknownType(kind));
    }

    serde_json::from_value(raw).map_err(|e| Error::InvalidMessage { kind, details: e.to_string() })
}

/// The routing fields of a frame, readable even when the body is not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub kind: String,
    pub id: Option<u64>,
    /// Set for an `apply` that expects no result.
    pub oneway: bool,
}

/// Decodes just the message type, call id and one-way flag from a raw frame.
/// This is useful for answering the right call when the full decoding fails.
pub fn decode_header(bytes: &[u8]) -> Result<Header> {
    let raw: serde_json::Value = serde_json::from_slice(bytes)
        .map_err(|e| Error::Malformed(e.to_string()))?;

    let kind = raw.get("type").and_then(|t| t.as_str()).ok_or(Error::MissingType)?;
    let id = raw.get("id").and_then(|i| i.as_u64());
    let oneway = raw.get("oneway").and_then(|o| o.as_bool()).unwrap_or(false);

    Ok(Header { kind: kind.to_string(), id, oneway })
}
