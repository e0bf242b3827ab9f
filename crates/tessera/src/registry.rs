// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Type registry: stable `u16` ids for message and root types.
//!
//! Both peers build a registry with the same types in the same order (or with
//! explicit ids), freeze it into an `Arc` and hand it to their node. The
//! handshake exchanges the table and an MD5 fingerprint of it; typed traffic
//! only flows once both sides agree.
//!
//! Id 0 is reserved for control frames (see [`CONTROL_TYPE_ID`]).
//!
//! # Example
//!
//! ```
//! use tessera::registry::TypeRegistry;
//! use tessera::ser::{Deserializer, Message, SerResult, Serializer};
//!
//! struct Ping(u32);
//!
//! impl Message for Ping {
//!     const TYPE_NAME: &'static str = "demo::Ping";
//!     fn encode(&self, w: &mut Serializer) -> SerResult<()> { w.put_u32(self.0) }
//!     fn decode(r: &mut Deserializer) -> SerResult<Self> { Ok(Ping(r.read_u32()?)) }
//! }
//!
//! let mut registry = TypeRegistry::new();
//! let id = registry.register::<Ping>().unwrap();
//! assert_eq!(id, 1);
//! assert_eq!(registry.id_of::<Ping>().unwrap(), 1);
//! ```

use crate::config::CONTROL_TYPE_ID;
use crate::ser::{decode_boxed, Deserializer, Message, SerError, SerResult, Serializer};
use crate::sync::{spawn_observed, RootFactory, SyncRoot};
use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Errors raised while building or querying a [`TypeRegistry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The Rust type was never registered.
    NotRegistered(&'static str),
    /// No entry carries this id.
    UnknownId(u16),
    /// The Rust type is already registered.
    DuplicateType(&'static str),
    /// The id is already taken by another type.
    DuplicateId(u16),
    /// Id 0 cannot be assigned.
    ReservedId,
    /// All 65535 ids are taken.
    IdSpaceExhausted,
    /// The entry exists but is not of the requested kind.
    WrongKind { id: u16, expected: EntryKind },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::NotRegistered(name) => write!(f, "type {} is not registered", name),
            RegistryError::UnknownId(id) => write!(f, "no type registered with id {}", id),
            RegistryError::DuplicateType(name) => write!(f, "type {} registered twice", name),
            RegistryError::DuplicateId(id) => write!(f, "type id {} already in use", id),
            RegistryError::ReservedId => {
                write!(f, "type id {} is reserved for control frames", CONTROL_TYPE_ID)
            }
            RegistryError::IdSpaceExhausted => write!(f, "no free type ids left"),
            RegistryError::WrongKind { id, expected } => {
                write!(f, "type id {} is not a {:?} entry", id, expected)
            }
        }
    }
}

impl std::error::Error for RegistryError {}

/// What an entry can be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EntryKind {
    /// Direct messages, request and response payloads.
    Message = 0,
    /// Replicated root types.
    Root = 1,
}

impl EntryKind {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(EntryKind::Message),
            1 => Some(EntryKind::Root),
            _ => None,
        }
    }
}

pub(crate) type DecodeFn = fn(&mut Deserializer) -> SerResult<Box<dyn Any + Send>>;

#[derive(Clone, Copy)]
pub(crate) enum EntryHooks {
    Message(DecodeFn),
    Root(RootFactory),
}

/// One registered type.
#[derive(Clone)]
pub struct TypeEntry {
    id: u16,
    name: &'static str,
    rust_type: TypeId,
    hooks: EntryHooks,
}

impl TypeEntry {
    pub fn id(&self) -> u16 {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> EntryKind {
        match self.hooks {
            EntryHooks::Message(_) => EntryKind::Message,
            EntryHooks::Root(_) => EntryKind::Root,
        }
    }

    pub fn is<T: 'static>(&self) -> bool {
        self.rust_type == TypeId::of::<T>()
    }

    pub(crate) fn root_factory(&self) -> Option<RootFactory> {
        match self.hooks {
            EntryHooks::Root(factory) => Some(factory),
            EntryHooks::Message(_) => None,
        }
    }
}

impl fmt::Debug for TypeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeEntry")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind())
            .finish()
    }
}

/// Bidirectional `u16 id <-> type` table.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    by_id: BTreeMap<u16, TypeEntry>,
    by_type: HashMap<TypeId, u16>,
    next_id: u16,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self {
            by_id: BTreeMap::new(),
            by_type: HashMap::new(),
            next_id: CONTROL_TYPE_ID + 1,
        }
    }

    /// Register a message type under the next free sequential id.
    pub fn register<T: Message>(&mut self) -> Result<u16, RegistryError> {
        let id = self.next_free()?;
        self.insert::<T>(id, T::TYPE_NAME, EntryHooks::Message(decode_boxed::<T>))
    }

    pub fn register_with_id<T: Message>(&mut self, id: u16) -> Result<u16, RegistryError> {
        self.insert::<T>(id, T::TYPE_NAME, EntryHooks::Message(decode_boxed::<T>))
    }

    /// Register a replicated root type under the next free sequential id.
    pub fn register_root<R: SyncRoot>(&mut self) -> Result<u16, RegistryError> {
        let id = self.next_free()?;
        self.insert::<R>(id, R::TYPE_NAME, EntryHooks::Root(spawn_observed::<R>))
    }

    pub fn register_root_with_id<R: SyncRoot>(&mut self, id: u16) -> Result<u16, RegistryError> {
        self.insert::<R>(id, R::TYPE_NAME, EntryHooks::Root(spawn_observed::<R>))
    }

    fn next_free(&mut self) -> Result<u16, RegistryError> {
        let mut candidate = self.next_id.max(CONTROL_TYPE_ID + 1);
        while self.by_id.contains_key(&candidate) {
            candidate = candidate
                .checked_add(1)
                .ok_or(RegistryError::IdSpaceExhausted)?;
        }
        Ok(candidate)
    }

    fn insert<T: 'static>(
        &mut self,
        id: u16,
        name: &'static str,
        hooks: EntryHooks,
    ) -> Result<u16, RegistryError> {
        if id == CONTROL_TYPE_ID {
            return Err(RegistryError::ReservedId);
        }
        let rust_type = TypeId::of::<T>();
        if self.by_type.contains_key(&rust_type) {
            return Err(RegistryError::DuplicateType(name));
        }
        if self.by_id.contains_key(&id) {
            return Err(RegistryError::DuplicateId(id));
        }
        self.by_id.insert(
            id,
            TypeEntry {
                id,
                name,
                rust_type,
                hooks,
            },
        );
        self.by_type.insert(rust_type, id);
        if id >= self.next_id {
            self.next_id = id.saturating_add(1);
        }
        log::debug!("[registry] {} -> id {}", name, id);
        Ok(id)
    }

    pub fn id_of<T: 'static>(&self) -> Result<u16, RegistryError> {
        self.by_type
            .get(&TypeId::of::<T>())
            .copied()
            .ok_or(RegistryError::NotRegistered(std::any::type_name::<T>()))
    }

    pub fn entry(&self, id: u16) -> Result<&TypeEntry, RegistryError> {
        self.by_id.get(&id).ok_or(RegistryError::UnknownId(id))
    }

    /// Id of a message type; fails if `T` is registered as a root.
    pub fn message_id<T: Message>(&self) -> Result<u16, RegistryError> {
        self.id_with_kind::<T>(EntryKind::Message)
    }

    /// Id of a root type; fails if `R` is registered as a message.
    pub fn root_id<R: SyncRoot>(&self) -> Result<u16, RegistryError> {
        self.id_with_kind::<R>(EntryKind::Root)
    }

    fn id_with_kind<T: 'static>(&self, expected: EntryKind) -> Result<u16, RegistryError> {
        let id = self.id_of::<T>()?;
        match self.entry(id)?.kind() {
            kind if kind == expected => Ok(id),
            _ => Err(RegistryError::WrongKind { id, expected }),
        }
    }

    /// Decode a message payload by type id.
    ///
    /// The caller downcasts the result to the concrete type.
    pub fn decode(&self, id: u16, r: &mut Deserializer) -> SerResult<Box<dyn Any + Send>> {
        let entry = self.entry(id).map_err(|e| SerError::InvalidData {
            reason: e.to_string(),
        })?;
        match entry.hooks {
            EntryHooks::Message(decode) => decode(r),
            EntryHooks::Root(_) => Err(SerError::InvalidData {
                reason: format!("type id {} is a root type, not a message", id),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &TypeEntry> {
        self.by_id.values()
    }

    /// MD5 over the `(id, kind, name)` table sorted by id.
    pub fn fingerprint(&self) -> [u8; 16] {
        fingerprint_of(
            self.by_id
                .values()
                .map(|e| (e.id, e.kind() as u8, e.name)),
        )
    }

    /// Write the table and its fingerprint (handshake payload).
    pub fn write(&self, w: &mut Serializer) -> SerResult<()> {
        let count = u16::try_from(self.by_id.len()).map_err(|_| SerError::WriteFailed {
            offset: w.len(),
            reason: "registry larger than u16::MAX entries".into(),
        })?;
        w.put_u16(count)?;
        for entry in self.by_id.values() {
            w.put_u16(entry.id)?;
            w.put_u8(entry.kind() as u8)?;
            w.put_str(entry.name)?;
        }
        w.put_bytes(&self.fingerprint())
    }

    /// Read a peer's table and report whether it matches this registry.
    ///
    /// Compatible means: same number of entries, every remote id maps to the
    /// same name and kind locally, and the fingerprints agree. A structurally
    /// broken table is an error rather than `Ok(false)`.
    pub fn verify(&self, r: &mut Deserializer) -> SerResult<bool> {
        let count = usize::from(r.read_u16()?);
        let mut remote = Vec::with_capacity(count.min(r.remaining()));
        for _ in 0..count {
            let id = r.read_u16()?;
            let raw_kind = r.read_u8()?;
            let kind = EntryKind::from_u8(raw_kind).ok_or_else(|| SerError::InvalidData {
                reason: format!("unknown registry entry kind {}", raw_kind),
            })?;
            let name = r.read_str()?;
            remote.push((id, kind, name));
        }
        let mut digest = [0u8; 16];
        digest.copy_from_slice(r.read_bytes(16)?);

        let recomputed =
            fingerprint_of(remote.iter().map(|(id, k, n)| (*id, *k as u8, n.as_str())));
        if recomputed != digest {
            log::warn!("[registry] peer fingerprint does not match its own table");
            return Ok(false);
        }

        if remote.len() != self.by_id.len() {
            log::warn!(
                "[registry] peer has {} types, local has {}",
                remote.len(),
                self.by_id.len()
            );
            return Ok(false);
        }
        for (id, kind, name) in &remote {
            match self.by_id.get(id) {
                Some(local) if local.name == name && local.kind() == *kind => {}
                Some(local) => {
                    log::warn!(
                        "[registry] id {} is {} ({:?}) locally but {} ({:?}) on peer",
                        id,
                        local.name,
                        local.kind(),
                        name,
                        kind
                    );
                    return Ok(false);
                }
                None => {
                    log::warn!("[registry] peer id {} ({}) unknown locally", id, name);
                    return Ok(false);
                }
            }
        }
        Ok(digest == self.fingerprint())
    }
}

fn fingerprint_of<'a, I>(entries: I) -> [u8; 16]
where
    I: Iterator<Item = (u16, u8, &'a str)>,
{
    use md5::{Digest, Md5};

    let mut sorted: Vec<_> = entries.collect();
    sorted.sort_by_key(|(id, _, _)| *id);

    let mut hasher = Md5::new();
    for (id, kind, name) in sorted {
        hasher.update(id.to_le_bytes());
        hasher.update([kind]);
        hasher.update((name.len() as u32).to_le_bytes());
        hasher.update(name.as_bytes());
    }
    let mut out = [0u8; 16];
    out.copy_from_slice(&hasher.finalize());
    out
}
