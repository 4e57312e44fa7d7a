//! Custom type serializers.
//!
//! A peer owns its own registry, keyed by a caller-chosen tag. An object whose
//! `constructor_tag` has a registered serializer crosses the boundary as
//! encoded data instead of as a handle.

use crate::error::Result;
use crate::peer::Peer;
use crate::target::Target;
use crate::value::Value;

/// A bidirectional encoder/decoder for one type tag.
///
/// Both directions receive the peer so nested values can be run through the
/// regular `serialize`/`deserialize` path.
pub trait Serializer: Send + Sync + 'static {
    fn serialize(&self, target: &dyn Target, peer: &Peer) -> Result<serde_json::Value>;

    fn deserialize(&self, encoded: serde_json::Value, peer: &Peer) -> Result<Value>;
}
