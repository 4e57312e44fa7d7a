//! # Remote Handles
//!
//! A `RemoteHandle` stands in for an object the far side owns. Invoking it
//! sends an `apply` through the owning peer; dropping the last clone releases
//! the far side's reference entry.
//!
//! ## Invariants
//!
//! - Per peer, each remote id maps to at most one live handle. Repeated
//!   deserialization of the same id yields clones of the same handle.
//! - Release is a `finalize` carrying the newest generation this handle has
//!   seen. The far side ignores it if it has exposed the object again since.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use linkwire::ApplyFrame;
use linkwire::Message;

use crate::error::Result;
use crate::peer::Peer;
use crate::peer::PendingCall;
use crate::target::Fault;
use crate::target::Target;
use crate::value::Value;

pub(crate) struct HandleState {
    pub(crate) peer: Peer,
    pub(crate) id: u64,
    pub(crate) generation: AtomicU64,
    pub(crate) constructor_tag: String,
    pub(crate) properties: Option<serde_json::Value>,
    pub(crate) oneway: Vec<String>,
}

impl HandleState {
    pub(crate) fn refresh(&self, generation: u64) {
        self.generation.fetch_max(generation, Ordering::AcqRel);
    }
}

impl Drop for HandleState {
    fn drop(&mut self) {
        let generation = self.generation.load(Ordering::Acquire);
        self.peer.release(self.id, generation, self as *const HandleState);
    }
}

/// A callable stand-in for an object owned by the far side of a peer.
#[derive(Clone)]
pub struct RemoteHandle {
    pub(crate) state: Arc<HandleState>,
}

impl RemoteHandle {
    /// The far side's local id for the object.
    pub fn id(&self) -> u64 {
        self.state.id
    }

    pub fn constructor_tag(&self) -> &str {
        &self.state.constructor_tag
    }

    pub fn declared_properties(&self) -> Option<&serde_json::Value> {
        self.state.properties.as_ref()
    }

    pub fn oneway_methods(&self) -> &[String] {
        &self.state.oneway
    }

    /// The newest generation seen in a descriptor for this object.
    pub fn generation(&self) -> u64 {
        self.state.generation.load(Ordering::Acquire)
    }

    /// The peer this handle was received through.
    pub fn peer(&self) -> &Peer {
        &self.state.peer
    }

    pub fn is_oneway(&self, method: &str) -> bool {
        self.state.oneway.iter().any(|m| m == method)
    }

    pub fn ptr_eq(&self, other: &RemoteHandle) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    /// Binds a method name without deciding yet whether it names a field or
    /// a function; nothing is sent until the binding is called.
    pub fn method(&self, name: impl Into<String>) -> MethodRef {
        MethodRef { handle: self.clone(), name: name.into() }
    }

    /// Invokes the handle itself as a function.
    pub fn call(&self, args: Vec<Value>) -> impl Future<Output = Result<Value>> + Send + use<> {
        self.invoke(None, args)
    }

    /// Invokes `method` (or the object itself when `None`) on the far side.
    ///
    /// The `apply` is sent before this returns, so calls go out in the order
    /// they are made. One-way methods resolve to null as soon as they are sent.
    pub fn invoke(&self, method: Option<&str>, args: Vec<Value>) -> impl Future<Output = Result<Value>> + Send + use<> {
        let issued = self.issue(method.map(str::to_string), args);
        async move {
            match issued? {
                Some(pending) => pending.await,
                None => Ok(Value::null()),
            }
        }
    }

    fn issue(
        &self,
        method: Option<String>,
        args: Vec<Value>,
    ) -> Result<Option<PendingCall>> {
        let peer = &self.state.peer;
        peer.ensure_active()?;

        let args = args.iter().map(|arg| peer.serialize(arg)).collect::<Result<Vec<_>>>()?;
        let proxy_id = self.state.id;

        if method.as_deref().is_some_and(|m| self.is_oneway(m)) {
            peer.post(Message::Apply(ApplyFrame::oneway(proxy_id, method, args)), None)?;
            return Ok(None);
        }

        let poster = peer.clone();
        let pending = peer.create_pending_call(move |id, failure| {
            let frame = ApplyFrame::call(id, proxy_id, method, args);
            poster.post(Message::Apply(frame), Some(failure))
        });
        Ok(Some(pending))
    }
}

impl fmt::Display for RemoteHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RemoteHandle({}#{} {}->{})",
            self.state.constructor_tag,
            self.state.id,
            self.state.peer.self_name(),
            self.state.peer.peer_name(),
        )
    }
}

impl fmt::Debug for RemoteHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// A handle exposed through a different peer is forwarded, not unwrapped.
#[async_trait::async_trait]
impl Target for RemoteHandle {
    fn constructor_tag(&self) -> &str {
        &self.state.constructor_tag
    }

    fn declared_properties(&self) -> Option<serde_json::Value> {
        self.state.properties.clone()
    }

    fn oneway_methods(&self) -> Vec<String> {
        self.state.oneway.clone()
    }

    async fn invoke(&self, method: Option<&str>, args: Vec<Value>) -> std::result::Result<Value, Fault> {
        let pending = RemoteHandle::invoke(self, method, args);
        pending.await.map_err(Fault::from)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A method name bound to a handle, awaiting invocation.
#[derive(Clone, Debug)]
pub struct MethodRef {
    handle: RemoteHandle,
    name: String,
}

impl MethodRef {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handle(&self) -> &RemoteHandle {
        &self.handle
    }

    pub fn call(&self, args: Vec<Value>) -> impl Future<Output = Result<Value>> + Send + use<> {
        self.handle.invoke(Some(&self.name), args)
    }
}
