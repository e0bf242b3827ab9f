// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Synchronization feature.

use super::root::{ErasedRoot, RootCell};
use super::{RootHandle, SyncError, SyncResult, SyncRoot};
use crate::error::ProtocolError;
use crate::feature::{Feature, FeatureKind, FeatureState};
use crate::frame::{FrameHeader, FrameKind};
use crate::node::Link;
use crate::ser::Deserializer;
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

type RootCallback = Arc<dyn Fn(&Arc<dyn ErasedRoot>) + Send + Sync>;
type UpdateCallback = Arc<dyn Fn(&Arc<dyn ErasedRoot>, u16) + Send + Sync>;

/// Roots this side created. Ids start at 1 and wrap, skipping live ids.
struct OwnedRoots {
    roots: HashMap<u16, Arc<dyn ErasedRoot>>,
    next: u16,
}

impl OwnedRoots {
    fn new() -> Self {
        Self {
            roots: HashMap::new(),
            next: 1,
        }
    }

    fn allocate(&mut self) -> Option<u16> {
        for _ in 0..u16::MAX {
            let id = self.next;
            self.next = match self.next.wrapping_add(1) {
                0 => 1,
                next => next,
            };
            if !self.roots.contains_key(&id) {
                return Some(id);
            }
        }
        None
    }
}

#[derive(Default)]
struct Handlers {
    create: HashMap<u16, RootCallback>,
    update: HashMap<u16, UpdateCallback>,
    destroy: HashMap<u16, RootCallback>,
}

#[derive(Default)]
struct ReadySignal {
    fired: bool,
    waiters: Vec<Box<dyn FnOnce() + Send>>,
}

/// Replicates roots between the two ends of a connection.
///
/// The side that calls [`create`](Self::create) is the root's authority and
/// the only one allowed to change or destroy it. The peer observes: it builds
/// a local instance from the create frame and applies updates as they come.
///
/// Owned and observed roots live in separate tables, so both peers can
/// allocate root ids independently.
pub struct SyncManager {
    me: Weak<SyncManager>,
    link: Arc<Link>,
    state: FeatureState,
    owned: Mutex<OwnedRoots>,
    observed: RwLock<HashMap<u16, Arc<dyn ErasedRoot>>>,
    handlers: RwLock<Handlers>,
    ready: Mutex<ReadySignal>,
}

impl SyncManager {
    pub fn new(link: Arc<Link>) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: Weak::clone(me),
            link,
            state: FeatureState::new(),
            owned: Mutex::new(OwnedRoots::new()),
            observed: RwLock::new(HashMap::new()),
            handlers: RwLock::new(Handlers::default()),
            ready: Mutex::new(ReadySignal::default()),
        })
    }

    pub(crate) fn link(&self) -> &Link {
        &self.link
    }

    pub(crate) fn check_sendable(&self) -> SyncResult<()> {
        if !self.state.is_enabled() {
            return Err(SyncError::Disabled);
        }
        if !self.link.is_open() {
            return Err(SyncError::NotAuthenticated);
        }
        Ok(())
    }

    /// Create a root owned by this side and replicate it to the peer.
    pub fn create<R: SyncRoot>(&self, initial: R) -> SyncResult<RootHandle<R>> {
        self.check_sendable()?;
        let type_id = self.link.registry().root_id::<R>()?;

        let cell = {
            let mut owned = self.owned.lock();
            let id = owned.allocate().ok_or(SyncError::RootIdsExhausted)?;
            let cell = Arc::new(RootCell::new(id, type_id, true, initial));
            let erased: Arc<dyn ErasedRoot> = cell.clone();
            owned.roots.insert(id, erased);
            cell
        };

        if let Err(e) = cell.send_create(&self.link) {
            self.owned.lock().roots.remove(&cell.root_id());
            cell.mark_destroyed();
            return Err(e);
        }
        log::debug!(
            "[sync] created {} #{} for {}",
            R::TYPE_NAME,
            cell.root_id(),
            self.link.peer()
        );
        Ok(RootHandle::new(cell, Weak::clone(&self.me)))
    }

    pub(crate) fn destroy_owned<R: SyncRoot>(&self, cell: &Arc<RootCell<R>>) -> SyncResult<()> {
        let sendable = self.check_sendable().is_ok();
        cell.send_destroy(sendable.then_some(&*self.link))?;
        self.owned.lock().roots.remove(&cell.root_id());
        log::debug!("[sync] destroyed {} #{}", R::TYPE_NAME, cell.root_id());
        Ok(())
    }

    /// Called when the peer creates a root of type `R`.
    ///
    /// Returns `true` if a previous handler for `R` was replaced.
    pub fn create_handler<R, F>(&self, handler: F) -> SyncResult<bool>
    where
        R: SyncRoot,
        F: Fn(&RootHandle<R>) + Send + Sync + 'static,
    {
        let type_id = self.link.registry().root_id::<R>()?;
        let callback = self.typed_callback::<R, _>(handler);
        let replaced = self.handlers.write().create.insert(type_id, callback).is_some();
        if replaced {
            log::warn!("[sync] create handler for {} replaced", R::TYPE_NAME);
        }
        Ok(replaced)
    }

    /// Called after each applied update with the field id.
    pub fn update_handler<R, F>(&self, handler: F) -> SyncResult<bool>
    where
        R: SyncRoot,
        F: Fn(&RootHandle<R>, u16) + Send + Sync + 'static,
    {
        let type_id = self.link.registry().root_id::<R>()?;
        let me = Weak::clone(&self.me);
        let callback: UpdateCallback = Arc::new(move |root: &Arc<dyn ErasedRoot>, field: u16| {
            if let Some(handle) = RootHandle::<R>::from_erased(root, &me) {
                handler(&handle, field);
            }
        });
        let replaced = self.handlers.write().update.insert(type_id, callback).is_some();
        if replaced {
            log::warn!("[sync] update handler for {} replaced", R::TYPE_NAME);
        }
        Ok(replaced)
    }

    /// Called when the peer destroys a root, or on teardown.
    pub fn destroy_handler<R, F>(&self, handler: F) -> SyncResult<bool>
    where
        R: SyncRoot,
        F: Fn(&RootHandle<R>) + Send + Sync + 'static,
    {
        let type_id = self.link.registry().root_id::<R>()?;
        let callback = self.typed_callback::<R, _>(handler);
        let replaced = self.handlers.write().destroy.insert(type_id, callback).is_some();
        if replaced {
            log::warn!("[sync] destroy handler for {} replaced", R::TYPE_NAME);
        }
        Ok(replaced)
    }

    fn typed_callback<R, F>(&self, handler: F) -> RootCallback
    where
        R: SyncRoot,
        F: Fn(&RootHandle<R>) + Send + Sync + 'static,
    {
        let me = Weak::clone(&self.me);
        Arc::new(move |root: &Arc<dyn ErasedRoot>| {
            if let Some(handle) = RootHandle::<R>::from_erased(root, &me) {
                handler(&handle);
            }
        })
    }

    /// Run `f` once after the first root created by the peer has been applied.
    ///
    /// Runs immediately if that already happened.
    pub fn on_ready<F: FnOnce() + Send + 'static>(&self, f: F) {
        let mut ready = self.ready.lock();
        if ready.fired {
            drop(ready);
            f();
        } else {
            ready.waiters.push(Box::new(f));
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.lock().fired
    }

    fn fire_ready(&self) {
        let waiters = {
            let mut ready = self.ready.lock();
            if ready.fired {
                return;
            }
            ready.fired = true;
            std::mem::take(&mut ready.waiters)
        };
        log::debug!("[sync] {} ready", self.link.peer());
        for waiter in waiters {
            waiter();
        }
    }

    /// Observed root by id, if of type `R`.
    pub fn observed<R: SyncRoot>(&self, root_id: u16) -> Option<RootHandle<R>> {
        let root = self.observed.read().get(&root_id).cloned()?;
        RootHandle::from_erased(&root, &self.me)
    }

    /// All observed roots of type `R`, by ascending id.
    pub fn observed_of<R: SyncRoot>(&self) -> Vec<RootHandle<R>> {
        let mut roots: Vec<_> = self
            .observed
            .read()
            .values()
            .filter_map(|root| RootHandle::from_erased(root, &self.me))
            .collect();
        roots.sort_by_key(|handle| handle.id());
        roots
    }

    pub fn owned_count(&self) -> usize {
        self.owned.lock().roots.len()
    }

    pub fn observed_count(&self) -> usize {
        self.observed.read().len()
    }

    fn handle_create(&self, type_id: u16, reader: &mut Deserializer) -> Result<(), ProtocolError> {
        let root_id = reader.read_u16()?;
        if self.observed.read().contains_key(&root_id) {
            return Err(ProtocolError::DuplicateRoot(root_id));
        }
        let factory = self
            .link
            .registry()
            .entry(type_id)
            .ok()
            .and_then(|entry| entry.root_factory())
            .ok_or(ProtocolError::UnknownType(type_id))?;
        let root = factory(root_id, type_id, reader)?;
        self.observed.write().insert(root_id, Arc::clone(&root));
        log::debug!(
            "[sync] {} created root #{} (type {})",
            self.link.peer(),
            root_id,
            type_id
        );

        let callback = self.handlers.read().create.get(&type_id).cloned();
        if let Some(callback) = callback {
            callback(&root);
        }
        self.fire_ready();
        Ok(())
    }

    fn handle_update(&self, type_id: u16, reader: &mut Deserializer) -> Result<(), ProtocolError> {
        let root_id = reader.read_u16()?;
        let field = reader.read_u16()?;
        let root = self
            .observed
            .read()
            .get(&root_id)
            .cloned()
            .ok_or(ProtocolError::UnknownRoot(root_id))?;
        if root.root_type() != type_id {
            return Err(ProtocolError::UnknownType(type_id));
        }
        root.apply_update(field, reader)?;

        let callback = self.handlers.read().update.get(&type_id).cloned();
        if let Some(callback) = callback {
            callback(&root, field);
        }
        Ok(())
    }

    fn handle_destroy(&self, type_id: u16, reader: &mut Deserializer) -> Result<(), ProtocolError> {
        let root_id = reader.read_u16()?;
        let root = {
            let mut observed = self.observed.write();
            match observed.get(&root_id).map(|root| root.root_type()) {
                Some(found) if found == type_id => observed.remove(&root_id),
                Some(_) => return Err(ProtocolError::UnknownType(type_id)),
                None => None,
            }
        };
        let root = root.ok_or(ProtocolError::UnknownRoot(root_id))?;
        root.mark_destroyed();
        log::debug!("[sync] {} destroyed root #{}", self.link.peer(), root_id);

        let callback = self.handlers.read().destroy.get(&type_id).cloned();
        if let Some(callback) = callback {
            callback(&root);
        }
        Ok(())
    }
}

impl Feature for SyncManager {
    fn kind(&self) -> FeatureKind {
        FeatureKind::Synchronization
    }

    fn enable(&self) -> bool {
        self.state.enable()
    }

    /// Destroys every root locally (nothing is sent) and drops all handlers.
    /// Destroy handlers still run for observed roots.
    fn disable(&self) -> bool {
        if !self.state.disable() {
            return false;
        }
        let owned: Vec<_> = self.owned.lock().roots.drain().map(|(_, r)| r).collect();
        for root in owned {
            root.mark_destroyed();
        }

        let handlers = std::mem::take(&mut *self.handlers.write());
        let observed: Vec<_> = self.observed.write().drain().map(|(_, r)| r).collect();
        for root in observed {
            root.mark_destroyed();
            if let Some(callback) = handlers.destroy.get(&root.root_type()) {
                callback(&root);
            }
        }
        self.ready.lock().waiters.clear();
        true
    }

    fn is_enabled(&self) -> bool {
        self.state.is_enabled()
    }

    fn handle_frame(
        &self,
        header: &FrameHeader,
        reader: &mut Deserializer,
    ) -> Result<(), ProtocolError> {
        match header.kind {
            FrameKind::SyncCreate => self.handle_create(header.type_id, reader),
            FrameKind::SyncUpdate => self.handle_update(header.type_id, reader),
            FrameKind::SyncDestroy => self.handle_destroy(header.type_id, reader),
            other => Err(ProtocolError::UnknownKind(other.as_u8())),
        }
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
