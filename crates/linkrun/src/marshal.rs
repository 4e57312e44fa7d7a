//! # Serialize / Deserialize
//!
//! Turns values into tagged wire values and back.
//!
//! Serialization, in priority order:
//!
//! 1. Data passes through unchanged; lists and maps are copied member by member.
//! 2. A handle received through this peer goes home as a back-reference, so a
//!    round trip never builds a proxy of a proxy.
//! 3. An object whose tag has a registered serializer is encoded by it.
//! 4. Anything else is exposed: its reference entry is found or created, its
//!    generation bumped, and a descriptor emitted.

use std::sync::Arc;
use std::sync::atomic::AtomicU64;

use linkwire::Descriptor;
use linkwire::Tagged;

use crate::error::Error;
use crate::error::Result;
use crate::handle::HandleState;
use crate::handle::RemoteHandle;
use crate::peer::Exposed;
use crate::peer::Peer;
use crate::target::Target;
use crate::value::Value;

impl Peer {
    /// Encodes `value` for the far side of this peer.
    pub fn serialize(&self, value: &Value) -> Result<Tagged> {
        self.ensure_active()?;

        match value {
            Value::Data(data) => Ok(Tagged::Data { value: data.clone() }),
            Value::List(items) => {
                let items = items.iter().map(|item| self.serialize(item)).collect::<Result<_>>()?;
                Ok(Tagged::List { items })
            }
            Value::Map(entries) => {
                let entries = entries
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), self.serialize(v)?)))
                    .collect::<Result<_>>()?;
                Ok(Tagged::Map { entries })
            }
            Value::Remote(handle) if handle.peer().owns(self) => {
                Ok(Tagged::Local { local_id: handle.id() })
            }
            Value::Remote(handle) => {
                let identity = Arc::as_ptr(&handle.state) as usize;
                let target: Arc<dyn Target> = Arc::new(handle.clone());
                Ok(self.expose(value, target, identity))
            }
            Value::Object(target) => {
                let tag = target.constructor_tag();
                let serializer = self.inner.serializers.get(tag).map(|s| s.value().clone());
                match serializer {
                    Some(serializer) => {
                        let encoded = serializer.serialize(target.as_ref(), self)?;
                        Ok(Tagged::Custom { constructor_tag: tag.to_string(), encoded })
                    }
                    None => {
                        let identity = Arc::as_ptr(target) as *const () as usize;
                        Ok(self.expose(value, target.clone(), identity))
                    }
                }
            }
        }
    }

    /// Decodes a tagged value received from the far side of this peer.
    pub fn deserialize(&self, tagged: Tagged) -> Result<Value> {
        self.ensure_active()?;

        match tagged {
            Tagged::Data { value } => Ok(Value::Data(value)),
            Tagged::List { items } => {
                let items = items.into_iter().map(|item| self.deserialize(item)).collect::<Result<_>>()?;
                Ok(Value::List(items))
            }
            Tagged::Map { entries } => {
                let entries = entries
                    .into_iter()
                    .map(|(k, v)| Ok((k, self.deserialize(v)?)))
                    .collect::<Result<_>>()?;
                Ok(Value::Map(entries))
            }
            Tagged::Remote(descriptor) => Ok(Value::Remote(self.remote_handle(descriptor))),
            Tagged::Local { local_id } => {
                let tables = self.tables();
                let exposed = tables.exposed.get(&local_id).ok_or(Error::InvalidLocalId(local_id))?;
                Ok(exposed.value.clone())
            }
            Tagged::Custom { constructor_tag, encoded } => {
                let serializer = self.inner.serializers.get(&constructor_tag).map(|s| s.value().clone());
                let serializer = serializer.ok_or(Error::MissingDeserializer(constructor_tag))?;
                serializer.deserialize(encoded, self)
            }
        }
    }

    /// Whether `other` is this very peer (not merely one with the same names).
    pub(crate) fn owns(&self, other: &Peer) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Looks up the object an `apply` targets.
    pub(crate) fn exposed_target(&self, local_id: u64) -> Result<Arc<dyn Target>> {
        let tables = self.tables();
        let exposed = tables.exposed.get(&local_id).ok_or(Error::UnknownProxy(local_id))?;
        Ok(exposed.target.clone())
    }

    fn expose(&self, value: &Value, target: Arc<dyn Target>, identity: usize) -> Tagged {
        // Read before locking: these are user code.
        let constructor_tag = target.constructor_tag().to_string();
        let declared_properties = target.declared_properties();
        let oneway = target.oneway_methods();

        let mut tables = self.tables();
        let id = match tables.by_identity.get(&identity) {
            Some(id) => *id,
            None => {
                let id = tables.next_local_id;
                tables.next_local_id += 1;
                tables.by_identity.insert(identity, id);
                tables.exposed.insert(id, Exposed { value: value.clone(), target, identity, generation: 0 });
                id
            }
        };

        let generation = match tables.exposed.get_mut(&id) {
            Some(entry) => {
                entry.generation += 1;
                entry.generation
            }
            None => 0,
        };

        Tagged::Remote(Descriptor {
            remote_id: id,
            finalizer_generation: generation,
            constructor_tag,
            declared_properties,
            oneway_methods: if oneway.is_empty() { None } else { Some(oneway) },
        })
    }

    /// Finds or creates the cached handle for a descriptor's id.
    fn remote_handle(&self, descriptor: Descriptor) -> RemoteHandle {
        let mut tables = self.tables();

        if let Some(state) = tables.remotes.get(&descriptor.remote_id).and_then(|w| w.upgrade()) {
            state.refresh(descriptor.finalizer_generation);
            return RemoteHandle { state };
        }

        let state = Arc::new(HandleState {
            peer: self.clone(),
            id: descriptor.remote_id,
            generation: AtomicU64::new(descriptor.finalizer_generation),
            constructor_tag: descriptor.constructor_tag,
            properties: descriptor.declared_properties,
            oneway: descriptor.oneway_methods.unwrap_or_default(),
        });
        tables.remotes.insert(descriptor.remote_id, Arc::downgrade(&state));
        RemoteHandle { state }
    }

    /// Deletes a reference entry if, and only if, `generation` is current.
    /// Returns the released entry so the caller can drop it outside the lock.
    pub(crate) fn release_exposed(&self, local_id: u64, generation: u64) -> Option<Exposed> {
        let mut tables = self.tables();
        let current = tables.exposed.get(&local_id).map(|e| e.generation)?;
        if current != generation {
            return None;
        }
        let entry = tables.exposed.remove(&local_id)?;
        tables.by_identity.remove(&entry.identity);
        Some(entry)
    }
}
