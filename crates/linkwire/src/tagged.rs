//! # Tagged Values
//!
//! The recursive encoding of a value crossing the boundary. A tagged value is
//! either plain data, a container whose members were encoded one by one, a
//! reference to an object (owned by the sender, or by the receiver), or a
//! value produced by a caller-registered serializer.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Tagged {
    /// Transport-safe data, carried unchanged.
    Data { value: serde_json::Value },
    /// A list whose members were each encoded separately.
    List { items: Vec<Tagged> },
    /// A string-keyed map whose members were each encoded separately.
    Map { entries: BTreeMap<String, Tagged> },
    /// An object owned by the sender, exposed to the receiver.
    Remote(Descriptor),
    /// An object owned by the receiver, coming back home.
    Local { local_id: u64 },
    /// A value encoded by the serializer registered for `constructor_tag`.
    Custom { constructor_tag: String, encoded: serde_json::Value },
}

impl Tagged {
    pub fn data(value: impl Into<serde_json::Value>) -> Self {
        Self::Data { value: value.into() }
    }

    pub fn null() -> Self {
        Self::Data { value: serde_json::Value::Null }
    }
}

/// Describes a newly- or re-exposed object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    pub remote_id: u64,
    pub finalizer_generation: u64,
    pub constructor_tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declared_properties: Option<serde_json::Value>,
    #[serde(default, rename = "onewayMethodNames", skip_serializing_if = "Option::is_none")]
    pub oneway_methods: Option<Vec<String>>,
}
