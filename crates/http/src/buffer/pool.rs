//! Slot arena for per-connection resources.
//!
//! The arena holds a fixed number of slots and a free-list of their indices. Leasing pops an
//! index and moves the item out; dropping the [`Pooled`] lease recycles the item and pushes
//! the index back. When every slot is leased, a detached item is built instead, which is
//! simply dropped once its connection ends.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::trace;

/// Resets an item to its initial state before it is handed out again.
pub trait Recycle {
    fn recycle(&mut self);
}

impl Recycle for Box<[u8]> {
    // buffer contents are never read before the next fill overwrites them
    fn recycle(&mut self) {}
}

struct Arena<T> {
    slots: Vec<Option<T>>,
    free: Vec<usize>,
}

pub struct Pool<T> {
    arena: Mutex<Arena<T>>,
    make: Box<dyn Fn() -> T + Send + Sync>,
}

impl<T> fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool").field("available", &self.available()).finish_non_exhaustive()
    }
}

impl<T: Recycle + Default> Pool<T> {
    /// Creates a pool of `capacity` slots, each filled by `make`.
    pub fn new<F>(capacity: usize, make: F) -> Arc<Self>
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let slots = (0..capacity).map(|_| Some(make())).collect();
        // pop from the back, so hand out the low indices first
        let free = (0..capacity).rev().collect();
        Arc::new(Self { arena: Mutex::new(Arena { slots, free }), make: Box::new(make) })
    }

    /// Leases an item, falling back to a detached one when every slot is taken.
    pub fn acquire(self: &Arc<Self>) -> Pooled<T> {
        let leased = {
            let mut arena = self.arena.lock().unwrap_or_else(PoisonError::into_inner);
            arena.free.pop().and_then(|index| arena.slots[index].take().map(|item| (index, item)))
        };

        match leased {
            Some((index, item)) => Pooled { item, home: Some((Arc::clone(self), index)) },
            None => {
                trace!("pool exhausted, allocate detached item");
                Pooled::detached((self.make)())
            }
        }
    }

    fn release(&self, index: usize, item: T) {
        let mut arena = self.arena.lock().unwrap_or_else(PoisonError::into_inner);
        arena.slots[index] = Some(item);
        arena.free.push(index);
    }
}

impl<T> Pool<T> {
    /// Number of slots currently free.
    pub fn available(&self) -> usize {
        self.arena.lock().unwrap_or_else(PoisonError::into_inner).free.len()
    }
}

/// A leased pool item; returns to its slot when dropped.
pub struct Pooled<T: Recycle + Default> {
    item: T,
    home: Option<(Arc<Pool<T>>, usize)>,
}

impl<T: Recycle + Default> Pooled<T> {
    /// Wraps an item that does not belong to any pool.
    pub fn detached(item: T) -> Self {
        Self { item, home: None }
    }

    pub fn is_pooled(&self) -> bool {
        self.home.is_some()
    }
}

impl<T: Recycle + Default + fmt::Debug> fmt::Debug for Pooled<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pooled").field("item", &self.item).field("pooled", &self.is_pooled()).finish()
    }
}

impl<T: Recycle + Default> Deref for Pooled<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.item
    }
}

impl<T: Recycle + Default> DerefMut for Pooled<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.item
    }
}

impl<T: Recycle + Default> Drop for Pooled<T> {
    fn drop(&mut self) {
        if let Some((pool, index)) = self.home.take() {
            let mut item = std::mem::take(&mut self.item);
            item.recycle();
            pool.release(index, item);
        }
    }
}
