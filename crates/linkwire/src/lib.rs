//! # Linkwire
//!
//! The wire vocabulary of the link protocol: five message variants and the
//! recursive tagged-value encoding carried inside `apply` arguments and
//! `result` payloads.
//!
//! ## Philosophy
//!
//! - **One Discriminant**: Every union on the wire carries exactly one tag field
//!   (`type` for messages, `kind` for values). Decoding is a single match,
//!   never "check which optional field is present".
//! - **Transport Agnostic**: This crate turns messages into bytes and back.
//!   It knows nothing about peers, ids in flight, or how bytes move.

mod codec;
mod error;
mod message;
mod tagged;


pub use crate::error::Error;
pub use crate::error::Result;

pub use crate::message::ApplyFrame;
pub use crate::message::FinalizeFrame;
pub use crate::message::Message;
pub use crate::message::OobFrame;
pub use crate::message::ParamFrame;
pub use crate::message::ResultFrame;

pub use crate::tagged::Descriptor;
pub use crate::tagged::Tagged;

pub use crate::codec::Header;
pub use crate::codec::MESSAGE_TYPES;
pub use crate::codec::decode;
pub use crate::codec::decode_header;
pub use crate::codec::encode;
