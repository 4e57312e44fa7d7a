//! # Error Definitions
//!
//! Everything a caller of a peer can observe going wrong. Errors are `Clone`
//! because a single kill fans the same error out to every pending call.

use crate::transport;

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// The transport could not deliver this call's message.
    Transport(transport::Error),
    /// A frame could not be encoded or decoded.
    Wire(linkwire::Error),
    /// The far side's code raised an error while handling the call.
    Remote(RemoteError),
    /// The peer was killed; carries the kill reason.
    Killed(String),
    /// A back-reference named an object this peer never exposed (or already released).
    InvalidLocalId(u64),
    /// An `apply` targeted an id with no exposed object behind it.
    UnknownProxy(u64),
    /// A custom-tagged value arrived with no serializer registered for its tag.
    MissingDeserializer(String),
    /// A registered serializer failed.
    Serializer { tag: String, details: String },
    /// The response channel closed without an answer.
    ChannelClosed,
}

impl Error {
    /// A short type tag, used as the `name` of an error result.
    pub fn name(&self) -> &str {
        match self {
            Self::Transport(_) => "TransportError",
            Self::Wire(_) => "WireError",
            Self::Remote(remote) => &remote.name,
            Self::Killed(_) => "PeerKilled",
            Self::InvalidLocalId(_) => "InvalidLocalId",
            Self::UnknownProxy(_) => "UnknownProxy",
            Self::MissingDeserializer(_) => "MissingDeserializer",
            Self::Serializer { .. } => "SerializerError",
            Self::ChannelClosed => "ChannelClosed",
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "Transport error: {}", e),
            Self::Wire(e) => write!(f, "Wire error: {}", e),
            Self::Remote(e) => write!(f, "{}", e),
            Self::Killed(reason) => write!(f, "peer was killed: {}", reason),
            Self::InvalidLocalId(id) => write!(f, "invalid local id {}", id),
            Self::UnknownProxy(id) => write!(f, "no object exposed under proxy id {}", id),
            Self::MissingDeserializer(tag) => write!(f, "no deserializer registered for '{}'", tag),
            Self::Serializer { tag, details } => write!(f, "serializer for '{}' failed: {}", tag, details),
            Self::ChannelClosed => write!(f, "Response channel closed"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport(e) => Some(e),
            Self::Wire(e) => Some(e),
            Self::Remote(e) => Some(e),
            _ => None,
        }
    }
}

impl From<transport::Error> for Error {
    fn from(e: transport::Error) -> Self {
        Self::Transport(e)
    }
}

impl From<linkwire::Error> for Error {
    fn from(e: linkwire::Error) -> Self {
        Self::Wire(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// An error raised by the far side's code, reconstructed locally.
///
/// Both peer names are kept so a failure can be traced across the boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteError {
    /// The error type tag the far side reported.
    pub name: String,
    pub message: String,
    pub stack: Option<String>,
    /// The peer that raised the error.
    pub peer_name: String,
    /// The peer that observed it.
    pub self_name: String,
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} (raised by '{}', seen by '{}')", self.name, self.message, self.peer_name, self.self_name)
    }
}

impl std::error::Error for RemoteError {}
