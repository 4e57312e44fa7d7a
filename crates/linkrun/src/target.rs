//! # Exposable Objects
//!
//! A `Target` is anything a peer can expose to the far side: it has a
//! constructor tag, optional declared properties, a set of one-way method
//! names, and a single generic entry point for invocation.
//!
//! `Object` is the ready-made implementation: a name→closure dispatch table.
//!
//! ## Invariants
//! - An unknown method name, or invoking an object with no call handler,
//!   always fails with a `MethodNotFound` fault.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::error::Error;
use crate::value::Value;

/// An application error raised by an invoked object.
///
/// This is what travels back in an error `result`. On the calling side it
/// resurfaces as `Error::Remote`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    /// Error type tag, e.g. `TypeError` or an application-chosen name.
    pub name: String,
    pub message: String,
    pub stack: Option<String>,
}

impl Fault {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self { name: name.into(), message: message.into(), stack: None }
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    pub fn method_not_found(tag: &str, method: Option<&str>) -> Self {
        let message = match method {
            Some(name) => format!("{} has no method '{}'", tag, name),
            None => format!("{} is not callable", tag),
        };
        Self::new("MethodNotFound", message)
    }
}

impl std::fmt::Display for Fault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

impl std::error::Error for Fault {}

/// Remote errors keep their original tag, so faults chain across hops.
impl From<Error> for Fault {
    fn from(e: Error) -> Self {
        match e {
            Error::Remote(remote) => Self {
                name: remote.name,
                message: remote.message,
                stack: remote.stack,
            },
            other => Self::new(other.name(), other.to_string()),
        }
    }
}

/// An object that can be invoked through a peer.
#[async_trait::async_trait]
pub trait Target: Send + Sync + 'static {
    /// The stable type tag sent in descriptors and used to find serializers.
    fn constructor_tag(&self) -> &str {
        "Object"
    }

    /// Extra transport-safe properties shipped with every descriptor.
    fn declared_properties(&self) -> Option<serde_json::Value> {
        None
    }

    /// Methods the far side should call without waiting for a result.
    fn oneway_methods(&self) -> Vec<String> {
        Vec::new()
    }

    /// Invokes `method`, or the object itself when `method` is `None`.
    async fn invoke(&self, method: Option<&str>, args: Vec<Value>) -> Result<Value, Fault>;

    fn as_any(&self) -> &dyn Any;
}

pub type MethodFuture = BoxFuture<'static, Result<Value, Fault>>;
pub type Method = Arc<dyn Fn(Vec<Value>) -> MethodFuture + Send + Sync>;

fn method<F, Fut>(f: F) -> Method
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, Fault>> + Send + 'static,
{
    Arc::new(move |args| f(args).boxed())
}

/// A name→closure dispatch table.
pub struct Object {
    tag: String,
    properties: Option<serde_json::Value>,
    oneway: Vec<String>,
    methods: HashMap<String, Method>,
    call: Option<Method>,
}

impl Object {
    pub fn builder(tag: impl Into<String>) -> ObjectBuilder {
        ObjectBuilder {
            object: Object {
                tag: tag.into(),
                properties: None,
                oneway: Vec::new(),
                methods: HashMap::new(),
                call: None,
            },
        }
    }

    /// A bare callable with no methods.
    pub fn function<F, Fut>(f: F) -> Arc<Object>
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, Fault>> + Send + 'static,
    {
        Self::builder("Function").call(f).build()
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }
}

#[async_trait::async_trait]
impl Target for Object {
    fn constructor_tag(&self) -> &str {
        &self.tag
    }

    fn declared_properties(&self) -> Option<serde_json::Value> {
        self.properties.clone()
    }

    fn oneway_methods(&self) -> Vec<String> {
        self.oneway.clone()
    }

    async fn invoke(&self, method: Option<&str>, args: Vec<Value>) -> Result<Value, Fault> {
        let handler = match method {
            Some(name) => self.methods.get(name),
            None => self.call.as_ref(),
        };
        let handler = handler.ok_or_else(|| Fault::method_not_found(&self.tag, method))?;
        handler(args).await
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Fluent builder for `Object`.
pub struct ObjectBuilder {
    object: Object,
}

impl ObjectBuilder {
    /// Registers a method that answers with a result.
    pub fn method<F, Fut>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, Fault>> + Send + 'static,
    {
        self.object.methods.insert(name.into(), method(f));
        self
    }

    /// Registers a fire-and-forget method.
    pub fn oneway<F, Fut>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, Fault>> + Send + 'static,
    {
        let name = name.into();
        self.object.oneway.push(name.clone());
        self.object.methods.insert(name, method(f));
        self
    }

    /// Makes the object itself callable.
    pub fn call<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, Fault>> + Send + 'static,
    {
        self.object.call = Some(method(f));
        self
    }

    pub fn properties(mut self, properties: serde_json::Value) -> Self {
        self.object.properties = Some(properties);
        self
    }

    pub fn build(self) -> Arc<Object> {
        Arc::new(self.object)
    }
}
