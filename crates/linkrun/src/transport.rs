//! # Transport Abstraction
//!
//! A minimal, async interface for moving bytes between peers.
//!
//! ## Philosophy
//!
//! - **Byte-Oriented**: The Transport knows nothing about messages, handles, or ids.
//!   It moves opaque buffers, one encoded message per buffer.
//! - **Full Duplex**: Both directions are independent. The peer writes from one
//!   task and reads from another; neither waits for the other.

use std::fmt;

/// Errors that occur at the network/transport layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The far side is unreachable or the connection was dropped.
    ConnectionLost(String),
    /// The far side rejected the payload size.
    PayloadTooLarge,
    /// Generic I/O error or internal transport failure.
    Io(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionLost(msg) => write!(f, "Connection lost: {}", msg),
            Self::PayloadTooLarge => write!(f, "Payload too large for transport"),
            Self::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

/// A bidirectional byte channel between two peers.
///
/// This trait is designed to be object-safe (`Arc<dyn Transport>`).
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Sends one encoded message.
    ///
    /// # invariants
    /// - Buffers are delivered to the far side in send order.
    /// - Should not interpret the payload content.
    async fn send(&self, payload: &[u8]) -> Result<()>;

    /// Receives the next encoded message.
    ///
    /// Returns `Ok(None)` once the far side has closed the channel. A transport
    /// that is fed by some other means may simply never resolve.
    async fn recv(&self) -> Result<Option<Vec<u8>>>;
}
