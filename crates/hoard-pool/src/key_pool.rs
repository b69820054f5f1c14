//! Recycling store for pool keys
//!
//! Every pool operation builds a `SizeKey` to probe the strategy; recycling
//! the spares keeps that per-op churn off the allocator. Spares are indexed
//! by the requested length and capped at a small count; once full, the
//! least-recently-stored spare is dropped.

use std::collections::VecDeque;

use hashbrown::HashMap;

use crate::kind::ArrayKind;
use crate::strategy::SizeKey;

/// Default bound on stored spare keys.
pub(crate) const DEFAULT_KEY_POOL_SIZE: usize = 10;

pub(crate) struct KeyPool {
    /// Spares grouped by the length they were last used for.
    classes: HashMap<usize, Vec<SizeKey>>,
    /// Length classes in the order spares were stored; stale entries are
    /// skipped during eviction.
    order: VecDeque<usize>,
    count: usize,
    capacity: usize,
}

impl KeyPool {
    pub(crate) fn new() -> Self {
        Self::with_capacity(DEFAULT_KEY_POOL_SIZE)
    }

    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            classes: HashMap::new(),
            order: VecDeque::new(),
            count: 0,
            capacity,
        }
    }

    /// A key shaped `(kind, len)`, recycled when a spare of that length
    /// class exists.
    pub(crate) fn acquire(&mut self, kind: ArrayKind, len: usize) -> SizeKey {
        if let Some(spares) = self.classes.get_mut(&len) {
            if let Some(mut key) = spares.pop() {
                self.count -= 1;
                key.reshape(kind, len);
                return key;
            }
        }
        SizeKey::new(kind, len)
    }

    /// Store a finished key for reuse, evicting the least-recently-stored
    /// spare when full.
    pub(crate) fn release(&mut self, key: SizeKey) {
        if self.capacity == 0 {
            return;
        }
        if self.count == self.capacity {
            self.evict_one();
        }
        let class = key.len();
        self.classes.entry(class).or_default().push(key);
        self.order.push_back(class);
        self.count += 1;
    }

    #[cfg(test)]
    pub(crate) fn spare_count(&self) -> usize {
        self.count
    }

    fn evict_one(&mut self) {
        while let Some(class) = self.order.pop_front() {
            if let Some(spares) = self.classes.get_mut(&class) {
                if spares.pop().is_some() {
                    self.count -= 1;
                    return;
                }
            }
        }
    }
}
