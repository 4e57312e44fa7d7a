//! # Linkrun
//!
//! A peer-to-peer object proxying runtime. Two peers connected by a byte
//! transport expose objects to each other: plain data is copied across,
//! everything else crosses as a `RemoteHandle` that forwards calls back to
//! the owner.
//!
//! ## Philosophy
//!
//! - **Symmetric**: There is no client or server. Either side can publish
//!   params, expose objects, and call into the other.
//! - **Identity Preserving**: Handing an object back to the peer that owns it
//!   yields the original object, not a proxy of a proxy.
//! - **Deterministic Reclamation**: A reference entry lives exactly as long as
//!   some handle on the far side might still name it. Generations guard the
//!   race between a release and a re-send of the same object.
//! - **Fault Isolation**: A transport failure fails the call that caused it; a
//!   protocol error is logged. Only a closed transport or `kill` ends a peer.

mod channel;
mod dispatch;
mod error;
mod handle;
mod marshal;
mod peer;
mod serializer;
mod target;
pub mod transport;
mod value;

#[cfg(test)]
mod tests;

pub use crate::error::Error;
pub use crate::error::RemoteError;
pub use crate::error::Result;

pub use crate::peer::FailureHandle;
pub use crate::peer::OobHandler;
pub use crate::peer::Peer;
pub use crate::peer::PeerBuilder;
pub use crate::peer::PendingCall;

pub use crate::handle::MethodRef;
pub use crate::handle::RemoteHandle;

pub use crate::target::Fault;
pub use crate::target::Method;
pub use crate::target::MethodFuture;
pub use crate::target::Object;
pub use crate::target::ObjectBuilder;
pub use crate::target::Target;

pub use crate::serializer::Serializer;
pub use crate::value::Value;

pub use crate::channel::ChannelTransport;
pub use crate::transport::Transport;
