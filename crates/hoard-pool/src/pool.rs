//! Byte-budgeted array pool
//!
//! `ArrayPool` recycles arrays by exact shape under a byte budget. Every
//! entry point is serialized on one mutex; hit/miss/eviction counters are
//! atomics readable without it.
//!
//! Values handed out by `get` belong to the caller; the pool neither tracks
//! nor validates returns. Returning the same allocation twice would
//! double-count bytes, so debug builds keep an identity set and panic on a
//! double put.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::kind::{ArrayKind, PooledArray};
use crate::strategy::{SizeKey, SizeStrategy};

/// Arrays larger than `max_size / OVERSIZE_DIVISOR` are never pooled; one
/// such array would crowd out everything else.
const OVERSIZE_DIVISOR: usize = 2;

/// Hit/miss/eviction counters, readable without the pool lock.
#[derive(Debug, Default)]
pub struct PoolStats {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl PoolStats {
    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }
}

/// Miss factory: builds a fresh array for a shape the pool cannot serve.
pub type Factory = Box<dyn Fn(&SizeKey) -> PooledArray + Send>;

struct PoolInner {
    strategy: SizeStrategy,
    current_bytes: usize,
    max_bytes: usize,
    /// One-shot latch: once released, every put recycles immediately.
    released: bool,
    factory: Factory,
    /// Identity set catching double puts of one allocation (debug builds).
    #[cfg(debug_assertions)]
    pooled_addrs: hashbrown::HashSet<usize>,
}

/// Size-bounded pool of typed arrays keyed by exact shape.
pub struct ArrayPool {
    inner: Mutex<PoolInner>,
    stats: PoolStats,
}

impl ArrayPool {
    /// Pool with the default zeroed-allocation factory.
    pub fn new(max_bytes: usize) -> Self {
        Self::with_factory(max_bytes, Box::new(|key| PooledArray::allocate(key.kind(), key.len())))
    }

    /// Pool with an injected miss factory.
    pub fn with_factory(max_bytes: usize, factory: Factory) -> Self {
        Self {
            inner: Mutex::new(PoolInner {
                strategy: SizeStrategy::new(),
                current_bytes: 0,
                max_bytes,
                released: false,
                factory,
                #[cfg(debug_assertions)]
                pooled_addrs: hashbrown::HashSet::new(),
            }),
            stats: PoolStats::default(),
        }
    }

    /// An array of exactly `(kind, len)`, zeroed. Pool hit or fresh
    /// allocation; either way the caller owns it.
    pub fn get(&self, kind: ArrayKind, len: usize) -> PooledArray {
        let mut array = self.fetch(kind, len);
        array.zero();
        array
    }

    /// As `get`, but a recycled array keeps whatever bytes it held.
    pub fn get_dirty(&self, kind: ArrayKind, len: usize) -> PooledArray {
        self.fetch(kind, len)
    }

    /// Return an array to the pool. Oversized arrays and puts after
    /// `release` are recycled (dropped) instead of pooled.
    pub fn put(&self, array: PooledArray) {
        let mut inner = self.inner.lock();
        if inner.released {
            return; // recycled by drop
        }
        let bytes = array.byte_size();
        if bytes > inner.max_bytes / OVERSIZE_DIVISOR {
            return;
        }

        #[cfg(debug_assertions)]
        if !array.is_empty() {
            debug_assert!(
                inner.pooled_addrs.insert(array.debug_addr()),
                "array returned to pool twice"
            );
        }

        inner.current_bytes += bytes;
        inner.strategy.put(array);
        self.evict_to_budget(&mut inner);
    }

    /// Evict every pooled value.
    pub fn clear_memory(&self) {
        let mut inner = self.inner.lock();
        self.evict_to_size(&mut inner, 0);
    }

    /// Terminal state: drop everything pooled and recycle all future puts.
    pub fn release(&self) {
        let mut inner = self.inner.lock();
        if !inner.released {
            inner.released = true;
            self.evict_to_size(&mut inner, 0);
        }
    }

    /// Shrink (or grow) the byte budget, evicting as needed.
    pub fn set_max_size(&self, max_bytes: usize) {
        let mut inner = self.inner.lock();
        inner.max_bytes = max_bytes;
        self.evict_to_budget(&mut inner);
    }

    pub fn current_size(&self) -> usize {
        self.inner.lock().current_bytes
    }

    pub fn max_size(&self) -> usize {
        self.inner.lock().max_bytes
    }

    pub fn hit_count(&self) -> u64 {
        self.stats.hits()
    }

    pub fn miss_count(&self) -> u64 {
        self.stats.misses()
    }

    pub fn eviction_count(&self) -> u64 {
        self.stats.evictions()
    }

    pub fn stats(&self) -> &PoolStats {
        &self.stats
    }

    /// Count of pooled values; test hook.
    #[cfg(test)]
    pub(crate) fn pooled_count(&self) -> usize {
        self.inner.lock().strategy.pooled_count()
    }

    fn fetch(&self, kind: ArrayKind, len: usize) -> PooledArray {
        let mut inner = self.inner.lock();
        match inner.strategy.get(kind, len) {
            Some(array) => {
                inner.current_bytes -= array.byte_size();
                #[cfg(debug_assertions)]
                if !array.is_empty() {
                    inner.pooled_addrs.remove(&array.debug_addr());
                }
                self.stats.record_hit();
                array
            }
            None => {
                self.stats.record_miss();
                (inner.factory)(&SizeKey::new(kind, len))
            }
        }
    }

    fn evict_to_budget(&self, inner: &mut PoolInner) {
        let target = inner.max_bytes;
        self.evict_to_size(inner, target);
    }

    fn evict_to_size(&self, inner: &mut PoolInner, target: usize) {
        let mut dropped = 0usize;
        while inner.current_bytes > target {
            let array = match inner.strategy.evict_one() {
                Some(array) => array,
                None => break,
            };
            inner.current_bytes -= array.byte_size();
            #[cfg(debug_assertions)]
            if !array.is_empty() {
                inner.pooled_addrs.remove(&array.debug_addr());
            }
            self.stats.record_eviction();
            dropped += 1;
        }
        if dropped > 0 {
            tracing::debug!(
                dropped,
                remaining = inner.strategy.pooled_count(),
                remaining_bytes = inner.current_bytes,
                "pool eviction sweep"
            );
        }
    }
}
