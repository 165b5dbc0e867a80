use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

/// An object checked out of a [`ResourcePool`].
///
/// Pool-owned items remember which pool created them; transient items were
/// allocated because the pool ran dry and are simply dropped on release.
pub struct Pooled<T> {
    value: T,
    owner: Option<u64>,
}

impl<T> Pooled<T> {
    /// Wraps a value that no pool owns.
    pub fn transient(value: T) -> Self {
        Self { value, owner: None }
    }

    pub fn is_transient(&self) -> bool {
        self.owner.is_none()
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T> Deref for Pooled<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> DerefMut for Pooled<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<T: fmt::Debug> fmt::Debug for Pooled<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pooled")
            .field("value", &self.value)
            .field("transient", &self.is_transient())
            .finish()
    }
}

/// Counters describing how a pool has been used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub capacity: usize,
    pub available: usize,
    pub transient_allocations: u64,
}

/// Fixed-capacity object pool for drawing primitives.
///
/// `acquire` hands out a reset pooled instance when one is free and otherwise
/// allocates a transient one, so it never blocks and never grows. The pool is
/// not internally synchronised; callers sharing it across threads wrap it in
/// a lock.
pub struct ResourcePool<T> {
    id: u64,
    capacity: usize,
    free: Vec<T>,
    factory: Box<dyn Fn() -> T + Send>,
    reset: Box<dyn Fn(&mut T) + Send>,
    transient_allocations: u64,
}

impl<T> ResourcePool<T> {
    /// Creates a pool and eagerly allocates `capacity` instances.
    pub fn new<F, R>(capacity: usize, factory: F, reset: R) -> Self
    where
        F: Fn() -> T + Send + 'static,
        R: Fn(&mut T) + Send + 'static,
    {
        let free = (0..capacity).map(|_| factory()).collect();
        Self {
            id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
            capacity,
            free,
            factory: Box::new(factory),
            reset: Box::new(reset),
            transient_allocations: 0,
        }
    }

    pub fn acquire(&mut self) -> Pooled<T> {
        match self.free.pop() {
            Some(mut value) => {
                (self.reset)(&mut value);
                Pooled {
                    value,
                    owner: Some(self.id),
                }
            }
            None => {
                self.transient_allocations += 1;
                debug!(capacity = self.capacity, "pool exhausted, allocating transient item");
                Pooled::transient((self.factory)())
            }
        }
    }

    /// Returns a pool-owned item. Transient and foreign items are dropped.
    pub fn release(&mut self, item: Pooled<T>) {
        if item.owner == Some(self.id) && self.free.len() < self.capacity {
            self.free.push(item.value);
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.free.len()
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            capacity: self.capacity,
            available: self.free.len(),
            transient_allocations: self.transient_allocations,
        }
    }

    /// Drops every pooled instance. Items still checked out will be treated
    /// as foreign when they come back.
    pub fn clear(&mut self) {
        self.free.clear();
        self.id = NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed);
    }

    /// Refills the pool to capacity after a [`ResourcePool::clear`].
    pub fn refill(&mut self) {
        while self.free.len() < self.capacity {
            self.free.push((self.factory)());
        }
    }
}

impl<T> fmt::Debug for ResourcePool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourcePool")
            .field("id", &self.id)
            .field("capacity", &self.capacity)
            .field("available", &self.free.len())
            .field("transient_allocations", &self.transient_allocations)
            .finish()
    }
}
