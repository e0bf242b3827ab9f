// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Outstanding request slots indexed by correlation id.
//!
//! The cursor advances past every allocation, so a freed id is reused as late
//! as possible and a late reply is unlikely to hit a newer request.

use super::{RequestRecord, ResponseStatus};
use crate::config::CORRELATION_SPACE;
use crate::ser::Deserializer;
use std::sync::atomic::Ordering;
use std::time::Instant;

/// What a resolver sees when its request completes.
pub(crate) struct Completion<'a> {
    pub(crate) status: ResponseStatus,
    /// Type id from the response header (0 when no payload).
    pub(crate) type_id: u16,
    /// Positioned at the response payload; `None` for local outcomes.
    pub(crate) reader: Option<&'a mut Deserializer>,
    pub(crate) record: RequestRecord,
}

pub(crate) type Resolver = Box<dyn for<'a> FnOnce(Completion<'a>) + Send>;

pub(crate) struct Pending {
    pub(crate) record: RequestRecord,
    pub(crate) deadline: Instant,
    resolver: Resolver,
}

impl Pending {
    pub(crate) fn new(record: RequestRecord, deadline: Instant, resolver: Resolver) -> Self {
        Self {
            record,
            deadline,
            resolver,
        }
    }

    /// Run the callback. Consumes the slot, so it runs at most once.
    pub(crate) fn resolve(
        self,
        status: ResponseStatus,
        type_id: u16,
        reader: Option<&mut Deserializer>,
    ) {
        let mut record = self.record;
        if !status.is_local() {
            record.received_at = Some(Instant::now());
        }
        record.responded.store(true, Ordering::Release);
        (self.resolver)(Completion {
            status,
            type_id,
            reader,
            record,
        });
    }
}

pub(crate) struct Outstanding {
    slots: Vec<Option<Pending>>,
    next: u8,
    live: usize,
}

impl Outstanding {
    pub(crate) fn new() -> Self {
        let mut slots = Vec::with_capacity(CORRELATION_SPACE);
        slots.resize_with(CORRELATION_SPACE, || None);
        Self {
            slots,
            next: 0,
            live: 0,
        }
    }

    /// Claim the next free id, or `None` when every id is outstanding.
    pub(crate) fn allocate<F>(&mut self, make: F) -> Option<u8>
    where
        F: FnOnce(u8) -> Pending,
    {
        if self.live == CORRELATION_SPACE {
            return None;
        }
        for _ in 0..CORRELATION_SPACE {
            let id = self.next;
            self.next = self.next.wrapping_add(1);
            let slot = &mut self.slots[usize::from(id)];
            if slot.is_none() {
                *slot = Some(make(id));
                self.live += 1;
                return Some(id);
            }
        }
        None
    }

    pub(crate) fn take(&mut self, id: u8) -> Option<Pending> {
        let taken = self.slots[usize::from(id)].take();
        if taken.is_some() {
            self.live -= 1;
        }
        taken
    }

    pub(crate) fn take_expired(&mut self, now: Instant) -> Vec<Pending> {
        let mut expired = Vec::new();
        for slot in &mut self.slots {
            if slot.as_ref().is_some_and(|p| p.deadline <= now) {
                if let Some(pending) = slot.take() {
                    expired.push(pending);
                }
            }
        }
        self.live -= expired.len();
        expired
    }

    pub(crate) fn drain(&mut self) -> Vec<Pending> {
        let drained: Vec<_> = self.slots.iter_mut().filter_map(Option::take).collect();
        self.live = 0;
        drained
    }

    pub(crate) fn len(&self) -> usize {
        self.live
    }

    pub(crate) fn contains(&self, id: u8) -> bool {
        self.slots[usize::from(id)].is_some()
    }
}
