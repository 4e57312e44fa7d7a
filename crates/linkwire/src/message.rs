//! # Protocol Messages
//!
//! The envelope exchanged between two peers.
//!
//! ## Invariants
//! - `apply.id` is present iff the call expects a `result`.
//! - A `result` is an error iff it carries `message` or `stack`.

use serde::Deserialize;
use serde::Serialize;

use crate::tagged::Tagged;

/// A single protocol message, discriminated by its `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Message {
    Param(ParamFrame),
    Apply(ApplyFrame),
    Result(ResultFrame),
    Finalize(FinalizeFrame),
    Oob(OobFrame),
}

impl Message {
    /// The wire name of this message's type.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Param(_) => "param",
            Self::Apply(_) => "apply",
            Self::Result(_) => "result",
            Self::Finalize(_) => "finalize",
            Self::Oob(_) => "oob",
        }
    }
}

/// Requests a named entry from the far side's published root namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamFrame {
    pub id: u64,
    pub param: String,
}

/// Invokes a method (or the object itself) on an object the far side owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyFrame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub proxy_id: u64,
    /// `None` invokes the target itself.
    pub method: Option<String>,
    pub args: Vec<Tagged>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub oneway: bool,
}

impl ApplyFrame {
    /// A call that expects a paired `result`.
    pub fn call(id: u64, proxy_id: u64, method: Option<String>, args: Vec<Tagged>) -> Self {
        Self { id: Some(id), proxy_id, method, args, oneway: false }
    }

    /// A fire-and-forget call; no `result` is ever produced for it.
    pub fn oneway(proxy_id: u64, method: Option<String>, args: Vec<Tagged>) -> Self {
        Self { id: None, proxy_id, method, args, oneway: true }
    }
}

/// Answers a `param` or a non-oneway `apply`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultFrame {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Tagged>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ResultFrame {
    pub fn ok(id: u64, result: Tagged) -> Self {
        Self { id, result: Some(result), name: None, message: None, stack: None }
    }

    pub fn err(id: u64, name: impl Into<String>, message: impl Into<String>, stack: Option<String>) -> Self {
        Self {
            id,
            result: None,
            name: Some(name.into()),
            message: Some(message.into()),
            stack,
        }
    }

    pub fn is_error(&self) -> bool {
        self.message.is_some() || self.stack.is_some()
    }
}

/// Releases the far side's reference entry, guarded by generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeFrame {
    pub local_id: u64,
    pub finalizer_generation: u64,
}

/// Side-channel payload; bypasses id and response bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OobFrame {
    pub oob: serde_json::Value,
}

fn is_false(b: &bool) -> bool {
    !*b
}
