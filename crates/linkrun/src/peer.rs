//! # Peer with Async Pumps
//!
//! A `Peer` is one endpoint of the link. It owns the id counters, the table of
//! pending calls, the reference tables for objects it exposes and handles it
//! holds, and the per-peer serializer registry.
//!
//! Two background tasks move bytes: the writer pump drains the outbound queue
//! into the transport and reports failures to the call that sent the message;
//! the reader pump decodes inbound frames and hands them to `handle_message`.
//! Neither pump keeps the peer alive. Live `Peer` clones and `RemoteHandle`s
//! do; when the last of them drops, the pumps stop and release the transport.
//!
//! ## Lifecycle
//!
//! A peer starts `Active` and moves once, irreversibly, to `Killed`. Killing
//! rejects every pending call, closes the outbound queue, and clears the
//! reference tables. Afterwards every outbound attempt fails immediately
//! without sending anything.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::sync::RwLock;
use std::sync::Weak;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::task::Context;
use std::task::Poll;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio::sync::watch;
use tracing::debug;
use tracing::info;
use tracing::warn;

use linkwire::FinalizeFrame;
use linkwire::Message;
use linkwire::OobFrame;
use linkwire::ParamFrame;

use crate::error::Error;
use crate::error::Result;
use crate::handle::HandleState;
use crate::serializer::Serializer;
use crate::target::Target;
use crate::transport::Transport;
use crate::value::Value;

/// Receives out-of-band payloads.
pub type OobHandler = Arc<dyn Fn(serde_json::Value) + Send + Sync>;

type Pending = DashMap<u64, oneshot::Sender<Result<Value>>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PeerState {
    Active,
    Killed(String),
}

/// A locally owned object currently exposed to the far side.
pub(crate) struct Exposed {
    /// What a back-reference resolves to.
    pub(crate) value: Value,
    /// What an `apply` invokes.
    pub(crate) target: Arc<dyn Target>,
    pub(crate) identity: usize,
    pub(crate) generation: u64,
}

/// Reference bookkeeping, guarded by one lock so the identity map, the id map
/// and the handle cache always agree.
pub(crate) struct Tables {
    pub(crate) next_local_id: u64,
    pub(crate) by_identity: HashMap<usize, u64>,
    pub(crate) exposed: HashMap<u64, Exposed>,
    pub(crate) remotes: HashMap<u64, Weak<HandleState>>,
}

impl Tables {
    fn new() -> Self {
        Self {
            next_local_id: 1,
            by_identity: HashMap::new(),
            exposed: HashMap::new(),
            remotes: HashMap::new(),
        }
    }
}

/// A message queued for the writer pump.
struct Outbound {
    message: Message,
    on_failure: Option<FailureHandle>,
}

pub(crate) struct PeerInner {
    self_name: String,
    peer_name: String,
    call_ids: AtomicU64,
    pending: Arc<Pending>,
    pub(crate) tables: Mutex<Tables>,
    pub(crate) params: DashMap<String, Value>,
    pub(crate) serializers: DashMap<String, Arc<dyn Serializer>>,
    pub(crate) oob_handler: RwLock<Option<OobHandler>>,
    outbound: Mutex<Option<mpsc::UnboundedSender<Outbound>>>,
    state: watch::Sender<PeerState>,
}

/// One endpoint of a bidirectional object-proxying link.
///
/// Cloning is cheap; clones share all state.
#[derive(Clone)]
pub struct Peer {
    pub(crate) inner: Arc<PeerInner>,
}

impl Peer {
    /// Creates a peer with no published params and spawns its pumps.
    /// Must be called from within a tokio runtime.
    pub fn new(
        self_name: impl Into<String>,
        peer_name: impl Into<String>,
        transport: Box<dyn Transport>,
    ) -> Self {
        PeerBuilder::new(self_name, peer_name).connect(transport)
    }

    pub fn self_name(&self) -> &str {
        &self.inner.self_name
    }

    pub fn peer_name(&self) -> &str {
        &self.inner.peer_name
    }

    pub fn is_killed(&self) -> bool {
        matches!(*self.inner.state.borrow(), PeerState::Killed(_))
    }

    /// Resolves once the peer has been killed.
    pub async fn closed(&self) {
        killed(self.inner.state.subscribe()).await;
    }

    /// Number of calls still waiting for a result.
    pub fn pending_calls(&self) -> usize {
        self.inner.pending.len()
    }

    /// Number of local objects currently exposed to the far side.
    pub fn exposed_count(&self) -> usize {
        self.tables().exposed.len()
    }

    /// The current generation of the reference entry for `local_id`, if any.
    pub fn exposed_generation(&self, local_id: u64) -> Option<u64> {
        self.tables().exposed.get(&local_id).map(|e| e.generation)
    }

    /// Publishes `value` in this peer's root namespace under `name`.
    pub fn set_param(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.inner.params.insert(name.into(), value.into());
    }

    pub fn remove_param(&self, name: &str) -> Option<Value> {
        self.inner.params.remove(name).map(|(_, v)| v)
    }

    pub fn add_serializer(&self, tag: impl Into<String>, serializer: impl Serializer) {
        self.inner.serializers.insert(tag.into(), Arc::new(serializer));
    }

    pub fn set_oob_handler(&self, handler: impl Fn(serde_json::Value) + Send + Sync + 'static) {
        let mut slot = self.inner.oob_handler.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(Arc::new(handler));
    }

    /// Fetches a named entry from the far side's root namespace.
    pub async fn get_param(&self, name: &str) -> Result<Value> {
        let poster = self.clone();
        let param = name.to_string();
        self.create_pending_call(move |id, failure| {
            poster.post(Message::Param(ParamFrame { id, param }), Some(failure))
        })
        .await
    }

    /// Sends a side-channel payload. No id, no response.
    pub fn send_oob(&self, payload: serde_json::Value) -> Result<()> {
        self.ensure_active()?;
        self.post(Message::Oob(OobFrame { oob: payload }), None)
    }

    /// Registers a pending call under a fresh id, then runs `issue` to send it.
    ///
    /// `issue` receives the id and a `FailureHandle` it should attach to the
    /// outbound message, so a transport failure rejects this call alone. If
    /// `issue` itself fails the registration is rolled back and the returned
    /// future resolves to that error.
    pub fn create_pending_call<F>(&self, issue: F) -> PendingCall
    where
        F: FnOnce(u64, FailureHandle) -> Result<()>,
    {
        match self.register_call(issue) {
            Ok(rx) => PendingCall { state: CallState::Waiting(rx) },
            Err(e) => PendingCall { state: CallState::Failed(Some(e)) },
        }
    }

    fn register_call<F>(&self, issue: F) -> Result<oneshot::Receiver<Result<Value>>>
    where
        F: FnOnce(u64, FailureHandle) -> Result<()>,
    {
        self.ensure_active()?;

        let id = self.inner.call_ids.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.inner.pending.insert(id, tx);

        // A kill racing the insert above has either rejected this entry already
        // or will never see it; either way the call must not be issued.
        if let Err(e) = self.ensure_active() {
            self.inner.pending.remove(&id);
            return Err(e);
        }

        let failure = FailureHandle { id, pending: Arc::downgrade(&self.inner.pending) };
        if let Err(e) = issue(id, failure) {
            self.inner.pending.remove(&id);
            return Err(e);
        }

        Ok(rx)
    }

    /// Kills the peer. Idempotent; only the first reason is kept.
    pub fn kill(&self, reason: impl Into<String>) {
        let reason = reason.into();
        let transitioned = self.inner.state.send_if_modified(|state| {
            if *state == PeerState::Active {
                *state = PeerState::Killed(reason.clone());
                true
            } else {
                false
            }
        });
        if !transitioned {
            return;
        }

        info!(peer = %self.inner.self_name, remote = %self.inner.peer_name, %reason, "peer killed");

        // Closing the queue lets the writer pump drain and drop the transport.
        let sender = self.inner.outbound.lock().unwrap_or_else(PoisonError::into_inner).take();
        drop(sender);

        let keys: Vec<u64> = self.inner.pending.iter().map(|e| *e.key()).collect();
        for key in keys {
            if let Some((_, tx)) = self.inner.pending.remove(&key) {
                let _ = tx.send(Err(Error::Killed(reason.clone())));
            }
        }

        // Dropped outside the lock: releasing an exposed object may drop
        // handles, whose release path takes the same lock.
        let (exposed, remotes) = {
            let mut tables = self.tables();
            tables.by_identity.clear();
            (std::mem::take(&mut tables.exposed), std::mem::take(&mut tables.remotes))
        };
        drop(exposed);
        drop(remotes);
    }

    pub(crate) fn ensure_active(&self) -> Result<()> {
        match &*self.inner.state.borrow() {
            PeerState::Active => Ok(()),
            PeerState::Killed(reason) => Err(Error::Killed(reason.clone())),
        }
    }

    pub(crate) fn tables(&self) -> MutexGuard<'_, Tables> {
        self.inner.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues a message for the writer pump.
    pub(crate) fn post(&self, message: Message, on_failure: Option<FailureHandle>) -> Result<()> {
        let outbound = self.inner.outbound.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(tx) = outbound.as_ref() else {
            return Err(self.ensure_active().err().unwrap_or(Error::ChannelClosed));
        };
        tx.send(Outbound { message, on_failure }).map_err(|_| Error::ChannelClosed)
    }

    /// Settles a pending call. Returns false if no call was waiting under `id`.
    pub(crate) fn settle(&self, id: u64, outcome: Result<Value>) -> bool {
        match self.inner.pending.remove(&id) {
            Some((_, tx)) => {
                // The caller may have stopped waiting; nobody is left to tell.
                let _ = tx.send(outcome);
                true
            }
            None => false,
        }
    }

    /// Release path of a dropped handle: forget the cache slot if it is still
    /// ours, then tell the far side which generation we last saw.
    pub(crate) fn release(&self, id: u64, generation: u64, state: *const HandleState) {
        {
            let mut tables = self.tables();
            let ours = tables.remotes.get(&id).is_some_and(|w| std::ptr::eq(w.as_ptr(), state));
            if ours {
                tables.remotes.remove(&id);
            }
        }

        if self.is_killed() {
            return;
        }

        debug!(peer = %self.inner.self_name, id, generation, "releasing remote handle");
        let frame = FinalizeFrame { local_id: id, finalizer_generation: generation };
        if let Err(e) = self.post(Message::Finalize(frame), None) {
            debug!(peer = %self.inner.self_name, id, error = %e, "finalize not sent");
        }
    }
}

/// Lets the writer pump fail one specific pending call.
pub struct FailureHandle {
    id: u64,
    pending: Weak<Pending>,
}

impl FailureHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Rejects the call with `error`, if it is still pending.
    pub fn fail(self, error: Error) {
        let Some(pending) = self.pending.upgrade() else { return };
        if let Some((_, tx)) = pending.remove(&self.id) {
            let _ = tx.send(Err(error));
        }
    }
}

enum CallState {
    Failed(Option<Error>),
    Waiting(oneshot::Receiver<Result<Value>>),
}

/// The future returned by `create_pending_call`. Settles exactly once.
pub struct PendingCall {
    state: CallState,
}

impl Future for PendingCall {
    type Output = Result<Value>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().state {
            CallState::Failed(error) => Poll::Ready(Err(error.take().unwrap_or(Error::ChannelClosed))),
            CallState::Waiting(rx) => Pin::new(rx)
                .poll(cx)
                .map(|received| received.unwrap_or(Err(Error::ChannelClosed))),
        }
    }
}

/// Fluent configuration for a peer. Everything set here is in place before
/// the pumps start, so no inbound message sees a half-configured peer.
pub struct PeerBuilder {
    self_name: String,
    peer_name: String,
    params: Vec<(String, Value)>,
    serializers: Vec<(String, Arc<dyn Serializer>)>,
    oob_handler: Option<OobHandler>,
}

impl PeerBuilder {
    pub fn new(self_name: impl Into<String>, peer_name: impl Into<String>) -> Self {
        Self {
            self_name: self_name.into(),
            peer_name: peer_name.into(),
            params: Vec::new(),
            serializers: Vec::new(),
            oob_handler: None,
        }
    }

    /// Publishes a root namespace entry the far side can fetch with `get_param`.
    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    pub fn serializer(mut self, tag: impl Into<String>, serializer: impl Serializer) -> Self {
        self.serializers.push((tag.into(), Arc::new(serializer)));
        self
    }

    pub fn oob_handler(mut self, handler: impl Fn(serde_json::Value) + Send + Sync + 'static) -> Self {
        self.oob_handler = Some(Arc::new(handler));
        self
    }

    /// Binds the transport and spawns the pumps.
    /// Must be called from within a tokio runtime.
    pub fn connect(self, transport: Box<dyn Transport>) -> Peer {
        let transport: Arc<dyn Transport> = Arc::from(transport);
        let (tx, rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(PeerState::Active);

        let inner = PeerInner {
            self_name: self.self_name,
            peer_name: self.peer_name,
            call_ids: AtomicU64::new(1),
            pending: Arc::new(DashMap::new()),
            tables: Mutex::new(Tables::new()),
            params: self.params.into_iter().collect(),
            serializers: self.serializers.into_iter().collect(),
            oob_handler: RwLock::new(self.oob_handler),
            outbound: Mutex::new(Some(tx)),
            state,
        };
        let peer = Peer { inner: Arc::new(inner) };

        info!(peer = %peer.self_name(), remote = %peer.peer_name(), "peer connected");

        tokio::spawn(write_pump(peer.inner.self_name.clone(), transport.clone(), rx));
        tokio::spawn(read_pump(
            peer.inner.self_name.clone(),
            Arc::downgrade(&peer.inner),
            peer.inner.state.subscribe(),
            transport,
        ));

        peer
    }
}

async fn write_pump(
    name: String,
    transport: Arc<dyn Transport>,
    mut rx: mpsc::UnboundedReceiver<Outbound>,
) {
    while let Some(Outbound { message, on_failure }) = rx.recv().await {
        let kind = message.kind();
        let sent = match linkwire::encode(&message) {
            Ok(bytes) => transport.send(&bytes).await.map_err(Error::from),
            Err(e) => Err(Error::from(e)),
        };

        match sent {
            Ok(()) => debug!(peer = %name, kind, "sent"),
            Err(e) => {
                warn!(peer = %name, kind, error = %e, "send failed");
                if let Some(failure) = on_failure {
                    failure.fail(e);
                }
            }
        }
    }
    debug!(peer = %name, "writer pump stopped");
}

/// Holds the peer weakly: once every `Peer` and `RemoteHandle` is gone the
/// state sender drops, `killed` resolves and the pump lets go of the
/// transport.
async fn read_pump(
    name: String,
    peer: Weak<PeerInner>,
    state: watch::Receiver<PeerState>,
    transport: Arc<dyn Transport>,
) {
    let stopped = killed(state);
    tokio::pin!(stopped);

    loop {
        let next = tokio::select! {
            next = transport.recv() => next,
            _ = &mut stopped => break,
        };
        let Some(inner) = peer.upgrade() else { break };
        let peer = Peer { inner };

        match next {
            Ok(Some(bytes)) => peer.receive(&bytes),
            Ok(None) => {
                peer.kill("transport closed");
                break;
            }
            Err(e) => {
                warn!(peer = %name, error = %e, "receive failed");
                peer.kill(format!("transport failed: {}", e));
                break;
            }
        }
    }
    debug!(peer = %name, "reader pump stopped");
}

/// Resolves once the peer is killed or dropped.
async fn killed(mut state: watch::Receiver<PeerState>) {
    let _ = state.wait_for(|s| matches!(s, PeerState::Killed(_))).await;
}
