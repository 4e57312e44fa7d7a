//! # Dynamic Values
//!
//! The values that flow through calls. Plain data crosses the boundary as is;
//! objects cross as handles; containers are copied member by member so they
//! can mix the two.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::handle::RemoteHandle;
use crate::target::Target;

#[derive(Clone)]
pub enum Value {
    /// Transport-safe data; crosses unchanged, never inspected for handles.
    Data(serde_json::Value),
    /// A list whose members are serialized one by one.
    List(Vec<Value>),
    /// A map whose members are serialized one by one.
    Map(BTreeMap<String, Value>),
    /// A locally owned object.
    Object(Arc<dyn Target>),
    /// A stand-in for an object owned by some peer's far side.
    Remote(RemoteHandle),
}

impl Value {
    pub fn null() -> Self {
        Self::Data(serde_json::Value::Null)
    }

    pub fn object<T: Target>(target: T) -> Self {
        Self::Object(Arc::new(target))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Data(serde_json::Value::Null))
    }

    pub fn as_data(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Data(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_data().and_then(|d| d.as_i64())
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.as_data().and_then(|d| d.as_f64())
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.as_data().and_then(|d| d.as_bool())
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_data().and_then(|d| d.as_str())
    }

    pub fn as_object(&self) -> Option<&Arc<dyn Target>> {
        match self {
            Self::Object(target) => Some(target),
            _ => None,
        }
    }

    pub fn as_remote(&self) -> Option<&RemoteHandle> {
        match self {
            Self::Remote(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn into_remote(self) -> Option<RemoteHandle> {
        match self {
            Self::Remote(handle) => Some(handle),
            _ => None,
        }
    }
}

/// Data compares by value; objects and handles compare by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Data(a), Self::Data(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)),
            (Self::Remote(a), Self::Remote(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Data(data) => write!(f, "Data({})", data),
            Self::List(items) => f.debug_list().entries(items).finish(),
            Self::Map(entries) => f.debug_map().entries(entries).finish(),
            Self::Object(target) => write!(f, "Object({})", target.constructor_tag()),
            Self::Remote(handle) => write!(f, "{}", handle),
        }
    }
}

macro_rules! impl_from_data {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self { Self::Data(serde_json::Value::from(v)) }
            }
        )*
    };
}

impl_from_data!(bool, i32, i64, u32, u64, f64, String, &str);

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Self::Data(v)
    }
}

impl From<RemoteHandle> for Value {
    fn from(handle: RemoteHandle) -> Self {
        Self::Remote(handle)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(items)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(entries: BTreeMap<String, Value>) -> Self {
        Self::Map(entries)
    }
}

impl From<Arc<dyn Target>> for Value {
    fn from(target: Arc<dyn Target>) -> Self {
        Self::Object(target)
    }
}

impl<T: Target> From<Arc<T>> for Value {
    fn from(target: Arc<T>) -> Self {
        Self::Object(target)
    }
}
