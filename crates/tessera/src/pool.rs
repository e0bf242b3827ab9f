// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reusable instance pools for serializers and deserializers.
//!
//! A [`Pool`] keeps idle instances in a bounded lock-free freelist
//! (crossbeam `ArrayQueue`). Renting pops an idle instance or constructs a new
//! one when the freelist is empty, so renting never blocks. The returned
//! [`Pooled`] guard hands the instance back on drop; ownership guarantees an
//! instance is returned exactly once and never touched afterward.
//!
//! # Lifecycle hooks
//!
//! - [`Poolable::on_renting`]: bring the instance to its initial state
//!   (buffer attached and empty).
//! - [`Poolable::on_returning`]: release payload state (buffer disposed).
//!
//! Pools are constructed explicitly and shared through [`Pools`]; there is no
//! process-wide instance.

use crate::ser::{Deserializer, SerResult, Serializer};
use crossbeam::queue::ArrayQueue;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// State reset hooks run by [`Pool`].
pub trait Poolable: Send + 'static {
    fn on_renting(&mut self);
    fn on_returning(&mut self);
}

impl Poolable for Serializer {
    fn on_renting(&mut self) {
        self.buffer_mut().attach();
    }

    fn on_returning(&mut self) {
        self.buffer_mut().dispose();
    }
}

impl Poolable for Deserializer {
    fn on_renting(&mut self) {
        self.buffer_mut().attach();
    }

    fn on_returning(&mut self) {
        self.buffer_mut().dispose();
    }
}

/// Snapshot of pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    /// Instances created since the pool was built.
    pub constructed: u64,
    /// Instances currently rented out.
    pub rented: usize,
    /// Idle instances in the freelist.
    pub idle: usize,
    /// Rents that found the freelist empty.
    pub exhausted: u64,
    /// Returns dropped because the freelist was full.
    pub discarded: u64,
}

/// Bounded cache of reusable `T` instances.
pub struct Pool<T: Poolable> {
    freelist: ArrayQueue<T>,
    construct: Box<dyn Fn() -> T + Send + Sync>,
    constructed: AtomicU64,
    rented: AtomicUsize,
    exhausted: AtomicU64,
    discarded: AtomicU64,
}

impl<T: Poolable> Pool<T> {
    /// Create a pool retaining at most `capacity` idle instances.
    ///
    /// `capacity` of zero is bumped to one (crossbeam queues need room for an element).
    pub fn new<F>(capacity: usize, construct: F) -> Arc<Self>
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Arc::new(Self {
            freelist: ArrayQueue::new(capacity.max(1)),
            construct: Box::new(construct),
            constructed: AtomicU64::new(0),
            rented: AtomicUsize::new(0),
            exhausted: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
        })
    }

    /// Rent an instance in its initial state.
    pub fn rent(self: &Arc<Self>) -> Pooled<T> {
        let mut item = match self.freelist.pop() {
            Some(item) => item,
            None => {
                self.exhausted.fetch_add(1, Ordering::Relaxed);
                self.constructed.fetch_add(1, Ordering::Relaxed);
                (self.construct)()
            }
        };
        item.on_renting();
        self.rented.fetch_add(1, Ordering::AcqRel);
        Pooled {
            item: Some(item),
            pool: Arc::clone(self),
        }
    }

    /// Pre-populate the freelist (up to capacity).
    pub fn warm(&self, count: usize) {
        for _ in 0..count.min(self.freelist.capacity()) {
            let mut item = (self.construct)();
            item.on_returning();
            self.constructed.fetch_add(1, Ordering::Relaxed);
            if self.freelist.push(item).is_err() {
                break;
            }
        }
    }

    pub fn capacity(&self) -> usize {
        self.freelist.capacity()
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            constructed: self.constructed.load(Ordering::Relaxed),
            rented: self.rented.load(Ordering::Acquire),
            idle: self.freelist.len(),
            exhausted: self.exhausted.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }

    fn give_back(&self, mut item: T) {
        item.on_returning();
        self.rented.fetch_sub(1, Ordering::AcqRel);
        if self.freelist.push(item).is_err() {
            self.discarded.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl<T: Poolable> fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("capacity", &self.capacity())
            .field("stats", &self.stats())
            .finish()
    }
}

/// Rented instance; returns to its pool when dropped.
pub struct Pooled<T: Poolable> {
    item: Option<T>,
    pool: Arc<Pool<T>>,
}

impl<T: Poolable> Pooled<T> {
    /// Return the instance now. Equivalent to dropping the guard.
    pub fn release(self) {}
}

impl<T: Poolable> Deref for Pooled<T> {
    type Target = T;

    fn deref(&self) -> &T {
        match self.item.as_ref() {
            Some(item) => item,
            // `item` is only taken in Drop.
            None => unreachable!("pooled instance accessed after return"),
        }
    }
}

impl<T: Poolable> DerefMut for Pooled<T> {
    fn deref_mut(&mut self) -> &mut T {
        match self.item.as_mut() {
            Some(item) => item,
            None => unreachable!("pooled instance accessed after return"),
        }
    }
}

impl<T: Poolable> Drop for Pooled<T> {
    fn drop(&mut self) {
        if let Some(item) = self.item.take() {
            self.pool.give_back(item);
        }
    }
}

impl<T: Poolable + fmt::Debug> fmt::Debug for Pooled<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pooled").field(&self.item).finish()
    }
}

/// Serializer and deserializer pools shared by every connection of a node.
#[derive(Debug)]
pub struct Pools {
    writers: Arc<Pool<Serializer>>,
    readers: Arc<Pool<Deserializer>>,
}

impl Pools {
    /// Pools retaining `capacity` idle instances each, buffers starting at
    /// `initial_buffer` bytes and writers bounded to `max_frame` bytes.
    pub fn new(capacity: usize, initial_buffer: usize, max_frame: usize) -> Self {
        Self {
            writers: Pool::new(capacity, move || Serializer::new(initial_buffer, max_frame)),
            readers: Pool::new(capacity, move || Deserializer::with_capacity(initial_buffer)),
        }
    }

    pub fn from_config(config: &crate::config::NodeConfig) -> Self {
        let pools = Self::new(
            config.pool_capacity,
            config.initial_buffer_capacity,
            config.max_frame_size,
        );
        pools.writers.warm(config.pool_warm);
        pools.readers.warm(config.pool_warm);
        pools
    }

    /// Rent an empty serializer.
    pub fn writer(&self) -> Pooled<Serializer> {
        self.writers.rent()
    }

    /// Rent a deserializer preloaded with `bytes`, cursor at 0.
    pub fn reader(&self, bytes: &[u8]) -> SerResult<Pooled<Deserializer>> {
        let mut reader = self.readers.rent();
        reader.load(bytes)?;
        Ok(reader)
    }

    pub fn writer_stats(&self) -> PoolStats {
        self.writers.stats()
    }

    pub fn reader_stats(&self) -> PoolStats {
        self.readers.stats()
    }
}

impl Default for Pools {
    fn default() -> Self {
        Self::from_config(&crate::config::NodeConfig::default())
    }
}
