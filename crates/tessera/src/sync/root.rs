// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Replicated root instances and their handles.

use super::{FieldTable, SyncError, SyncManager, SyncResult, SyncRoot};
use crate::error::ProtocolError;
use crate::frame::FrameKind;
use crate::node::Link;
use crate::ser::{Deserializer, SerResult, Serializer};
use parking_lot::Mutex;
use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

/// Replication bookkeeping of one field.
#[derive(Debug, Default)]
struct Slot {
    dirty: bool,
    /// Encoding last sent to the peer.
    shadow: Vec<u8>,
}

pub(crate) struct RootState<R> {
    value: R,
    slots: Vec<Slot>,
    destroyed: bool,
}

/// One live root, shared by its handles and the manager's tables.
pub(crate) struct RootCell<R: SyncRoot> {
    id: u16,
    type_id: u16,
    authority: bool,
    table: FieldTable<R>,
    /// Held across encode and send so frames of one root never interleave.
    state: Mutex<RootState<R>>,
}

impl<R: SyncRoot> RootCell<R> {
    pub(crate) fn new(id: u16, type_id: u16, authority: bool, value: R) -> Self {
        let table = FieldTable::<R>::build();
        let slots = (0..table.len()).map(|_| Slot::default()).collect();
        Self {
            id,
            type_id,
            authority,
            table,
            state: Mutex::new(RootState {
                value,
                slots,
                destroyed: false,
            }),
        }
    }

    /// Send `[SyncCreate][type][root id][fields...]` and record every shadow.
    pub(crate) fn send_create(&self, link: &Link) -> SyncResult<()> {
        let mut state = self.state.lock();
        let mut frame = link.frame(FrameKind::SyncCreate, self.type_id)?;
        frame.put_u16(self.id)?;
        let mut scratch = link.pools().writer();
        let RootState { value, slots, .. } = &mut *state;
        for (id, slot) in self.table.ids().zip(slots.iter_mut()) {
            scratch.clear();
            encode_field(&self.table, id, value, &mut scratch)?;
            frame.put_bytes(scratch.as_bytes())?;
            slot.shadow.clear();
            slot.shadow.extend_from_slice(scratch.as_bytes());
            slot.dirty = false;
        }
        link.send(&frame)?;
        Ok(())
    }

    /// Mark fields whose encoding differs from the shadow. Returns how many
    /// fields are dirty afterwards.
    fn diff(&self, state: &mut RootState<R>, link: &Link) -> SyncResult<usize> {
        let mut scratch = link.pools().writer();
        let RootState { value, slots, .. } = state;
        for (id, slot) in self.table.ids().zip(slots.iter_mut()) {
            if slot.dirty {
                continue;
            }
            scratch.clear();
            encode_field(&self.table, id, value, &mut scratch)?;
            slot.dirty = scratch.as_bytes() != slot.shadow.as_slice();
        }
        Ok(slots.iter().filter(|s| s.dirty).count())
    }

    /// One `[SyncUpdate][type][root id][field id][value]` per dirty field.
    fn flush_locked(&self, state: &mut RootState<R>, link: &Link) -> SyncResult<usize> {
        let mut scratch = link.pools().writer();
        let mut sent = 0;
        let RootState { value, slots, .. } = state;
        for (id, slot) in self.table.ids().zip(slots.iter_mut()) {
            if !slot.dirty {
                continue;
            }
            scratch.clear();
            encode_field(&self.table, id, value, &mut scratch)?;
            let mut frame = link.frame(FrameKind::SyncUpdate, self.type_id)?;
            frame.put_u16(self.id)?;
            frame.put_u16(id)?;
            frame.put_bytes(scratch.as_bytes())?;
            link.send(&frame)?;
            slot.shadow.clear();
            slot.shadow.extend_from_slice(scratch.as_bytes());
            slot.dirty = false;
            sent += 1;
        }
        Ok(sent)
    }
}

fn encode_field<R>(
    table: &FieldTable<R>,
    id: u16,
    value: &R,
    w: &mut Serializer,
) -> SyncResult<()> {
    match table.encode(id, value, w) {
        Some(result) => result.map_err(SyncError::from),
        None => Err(SyncError::UnknownField(id)),
    }
}

/// Type-erased view of a root, used by the manager's tables.
pub(crate) trait ErasedRoot: Send + Sync {
    fn root_id(&self) -> u16;
    fn root_type(&self) -> u16;
    fn apply_update(&self, field: u16, r: &mut Deserializer) -> Result<(), ProtocolError>;
    fn mark_destroyed(&self);
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<R: SyncRoot> ErasedRoot for RootCell<R> {
    fn root_id(&self) -> u16 {
        self.id
    }

    fn root_type(&self) -> u16 {
        self.type_id
    }

    fn apply_update(&self, field: u16, r: &mut Deserializer) -> Result<(), ProtocolError> {
        let mut state = self.state.lock();
        if state.destroyed {
            return Err(ProtocolError::UnknownRoot(self.id));
        }
        match self.table.decode(field, &mut state.value, r) {
            Some(result) => Ok(result?),
            None => Err(ProtocolError::UnknownField {
                root: self.id,
                field,
            }),
        }
    }

    fn mark_destroyed(&self) {
        self.state.lock().destroyed = true;
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Builds the observer-side instance from a create frame.
pub(crate) type RootFactory = fn(u16, u16, &mut Deserializer) -> SerResult<Arc<dyn ErasedRoot>>;

/// [`RootFactory`] for `R`: default-construct, then apply every field in id order.
pub(crate) fn spawn_observed<R: SyncRoot>(
    root_id: u16,
    type_id: u16,
    r: &mut Deserializer,
) -> SerResult<Arc<dyn ErasedRoot>> {
    let cell = RootCell::new(root_id, type_id, false, R::default());
    {
        let mut state = cell.state.lock();
        for id in cell.table.ids() {
            if let Some(result) = cell.table.decode(id, &mut state.value, r) {
                result?;
            }
        }
    }
    Ok(Arc::new(cell))
}

/// Handle to a replicated root.
///
/// On the authority side (the one that called `create`) the handle mutates
/// the root and replicates changes. On the observer side it is read-only and
/// tracks the authority's updates.
pub struct RootHandle<R: SyncRoot> {
    cell: Arc<RootCell<R>>,
    manager: Weak<SyncManager>,
}

impl<R: SyncRoot> Clone for RootHandle<R> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
            manager: Weak::clone(&self.manager),
        }
    }
}

impl<R: SyncRoot> RootHandle<R> {
    pub(crate) fn new(cell: Arc<RootCell<R>>, manager: Weak<SyncManager>) -> Self {
        Self { cell, manager }
    }

    pub(crate) fn from_erased(
        root: &Arc<dyn ErasedRoot>,
        manager: &Weak<SyncManager>,
    ) -> Option<Self> {
        let cell = Arc::clone(root).as_any().downcast::<RootCell<R>>().ok()?;
        Some(Self::new(cell, Weak::clone(manager)))
    }

    /// Root id, unique among live roots of the owning side.
    pub fn id(&self) -> u16 {
        self.cell.id
    }

    /// Registry id of `R`.
    pub fn type_id(&self) -> u16 {
        self.cell.type_id
    }

    pub fn is_authority(&self) -> bool {
        self.cell.authority
    }

    pub fn is_destroyed(&self) -> bool {
        self.cell.state.lock().destroyed
    }

    pub fn fields(&self) -> &FieldTable<R> {
        &self.cell.table
    }

    pub fn read<T>(&self, f: impl FnOnce(&R) -> T) -> T {
        f(&self.cell.state.lock().value)
    }

    /// Mutate and replicate.
    ///
    /// Changed fields are detected by comparing encodings with what was last
    /// sent. With `auto_flush` off this behaves like [`stage`](Self::stage).
    pub fn write<T>(&self, f: impl FnOnce(&mut R) -> T) -> SyncResult<T> {
        let manager = self.authority()?;
        let link = manager.link();
        let mut state = self.cell.state.lock();
        if state.destroyed {
            return Err(SyncError::Destroyed);
        }
        let out = f(&mut state.value);
        let dirty = self.cell.diff(&mut state, link)?;
        if dirty > 0 && link.config().auto_flush {
            manager.check_sendable()?;
            self.cell.flush_locked(&mut state, link)?;
        }
        Ok(out)
    }

    /// Mutate without sending; changed fields stay dirty until [`flush`](Self::flush).
    pub fn stage<T>(&self, f: impl FnOnce(&mut R) -> T) -> SyncResult<T> {
        let manager = self.authority()?;
        let mut state = self.cell.state.lock();
        if state.destroyed {
            return Err(SyncError::Destroyed);
        }
        let out = f(&mut state.value);
        self.cell.diff(&mut state, manager.link())?;
        Ok(out)
    }

    /// Force a field to be sent on the next flush.
    pub fn mark_dirty(&self, field: u16) -> SyncResult<()> {
        self.authority()?;
        let mut state = self.cell.state.lock();
        if state.destroyed {
            return Err(SyncError::Destroyed);
        }
        let slot = state
            .slots
            .get_mut(usize::from(field))
            .ok_or(SyncError::UnknownField(field))?;
        slot.dirty = true;
        Ok(())
    }

    pub fn dirty_fields(&self) -> Vec<u16> {
        let state = self.cell.state.lock();
        self.cell
            .table
            .ids()
            .zip(state.slots.iter())
            .filter(|(_, slot)| slot.dirty)
            .map(|(id, _)| id)
            .collect()
    }

    /// Send every dirty field. Returns the number of updates sent.
    pub fn flush(&self) -> SyncResult<usize> {
        let manager = self.authority()?;
        manager.check_sendable()?;
        let mut state = self.cell.state.lock();
        if state.destroyed {
            return Err(SyncError::Destroyed);
        }
        self.cell.flush_locked(&mut state, manager.link())
    }

    /// Remove the root here and on the peer.
    pub fn destroy(&self) -> SyncResult<()> {
        let manager = self.authority()?;
        manager.destroy_owned(&self.cell)
    }

    fn authority(&self) -> SyncResult<Arc<SyncManager>> {
        if !self.cell.authority {
            return Err(SyncError::NotAuthority);
        }
        self.manager.upgrade().ok_or(SyncError::Disabled)
    }
}

impl<R: SyncRoot> RootCell<R> {
    /// Mark destroyed and send `[SyncDestroy]` under the root lock.
    pub(crate) fn send_destroy(&self, link: Option<&Link>) -> SyncResult<()> {
        let mut state = self.state.lock();
        if state.destroyed {
            return Err(SyncError::Destroyed);
        }
        state.destroyed = true;
        if let Some(link) = link {
            let mut frame = link.frame(FrameKind::SyncDestroy, self.type_id)?;
            frame.put_u16(self.id)?;
            link.send(&frame)?;
        }
        Ok(())
    }
}

impl<R: SyncRoot + fmt::Debug> fmt::Debug for RootHandle<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.cell.state.lock();
        f.debug_struct("RootHandle")
            .field("id", &self.cell.id)
            .field("type_id", &self.cell.type_id)
            .field("authority", &self.cell.authority)
            .field("destroyed", &state.destroyed)
            .field("value", &state.value)
            .finish()
    }
}
