//! Size-class retrieval strategy
//!
//! Pooled arrays are grouped by `(kind, len)` in a `GroupedLru`. Retrieval
//! is exact-size: a request either finds an array of precisely the asked
//! shape or misses. Alongside the grouped map, a per-kind sorted ledger
//! tracks how many arrays of each length are pooled; it is kept consistent
//! on every put/get/evict so a best-fit lookup can be layered on later
//! without re-walking the buckets.

use std::collections::BTreeMap;

use hashbrown::HashMap;

use crate::grouped::GroupedLru;
use crate::key_pool::KeyPool;
use crate::kind::{ArrayKind, PooledArray};

/// Pool key: an array shape. Equality is by kind and length.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SizeKey {
    kind: ArrayKind,
    len: usize,
}

impl SizeKey {
    pub fn new(kind: ArrayKind, len: usize) -> Self {
        Self { kind, len }
    }

    pub fn kind(&self) -> ArrayKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Total bytes an array of this shape occupies.
    pub fn byte_size(&self) -> usize {
        self.len * self.kind.element_size()
    }

    pub(crate) fn reshape(&mut self, kind: ArrayKind, len: usize) {
        self.kind = kind;
        self.len = len;
    }
}

pub(crate) struct SizeStrategy {
    groups: GroupedLru<SizeKey, PooledArray>,
    /// Per-kind sorted ledger: length -> pooled count.
    ledgers: HashMap<ArrayKind, BTreeMap<usize, usize>>,
    keys: KeyPool,
}

impl SizeStrategy {
    pub(crate) fn new() -> Self {
        Self {
            groups: GroupedLru::new(),
            ledgers: HashMap::new(),
            keys: KeyPool::new(),
        }
    }

    /// Exact-shape lookup. A hit decrements the ledger.
    pub(crate) fn get(&mut self, kind: ArrayKind, len: usize) -> Option<PooledArray> {
        let key = self.keys.acquire(kind, len);
        let found = self.groups.get(&key);
        self.keys.release(key);

        if found.is_some() {
            self.decrement(kind, len);
        }
        found
    }

    pub(crate) fn put(&mut self, value: PooledArray) {
        let (kind, len) = (value.kind(), value.len());
        let key = self.keys.acquire(kind, len);
        if let Some(spare) = self.groups.put(key, value) {
            self.keys.release(spare);
        }
        self.increment(kind, len);
    }

    /// Evict the least-recently-inserted array of the tail-most bucket.
    pub(crate) fn evict_one(&mut self) -> Option<PooledArray> {
        let value = self.groups.remove_last()?;
        self.decrement(value.kind(), value.len());
        Some(value)
    }

    pub(crate) fn pooled_count(&self) -> usize {
        self.groups.len()
    }

    /// Ledger count for one shape; test hook for consistency checks.
    #[cfg(test)]
    pub(crate) fn ledger_count(&self, kind: ArrayKind, len: usize) -> usize {
        self.ledgers
            .get(&kind)
            .and_then(|ledger| ledger.get(&len))
            .copied()
            .unwrap_or(0)
    }

    fn increment(&mut self, kind: ArrayKind, len: usize) {
        *self
            .ledgers
            .entry(kind)
            .or_default()
            .entry(len)
            .or_insert(0) += 1;
    }

    fn decrement(&mut self, kind: ArrayKind, len: usize) {
        let ledger = self
            .ledgers
            .get_mut(&kind)
            .unwrap_or_else(|| panic!("size ledger missing for {:?}", kind));
        let count = ledger
            .get_mut(&len)
            .unwrap_or_else(|| panic!("size ledger underflow for {:?}[{}]", kind, len));
        *count -= 1;
        if *count == 0 {
            ledger.remove(&len);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match_only() {
        let mut strategy = SizeStrategy::new();
        strategy.put(PooledArray::allocate(ArrayKind::U8, 32));

        // Neither a different length nor a different kind matches.
        assert!(strategy.get(ArrayKind::U8, 16).is_none());
        assert!(strategy.get(ArrayKind::I32, 32).is_none());
        assert!(strategy.get(ArrayKind::U8, 32).is_some());
    }

    #[test]
    fn test_ledger_tracks_puts_and_gets() {
        let mut strategy = SizeStrategy::new();
        strategy.put(PooledArray::allocate(ArrayKind::U8, 8));
        strategy.put(PooledArray::allocate(ArrayKind::U8, 8));
        assert_eq!(strategy.ledger_count(ArrayKind::U8, 8), 2);

        strategy.get(ArrayKind::U8, 8).unwrap();
        assert_eq!(strategy.ledger_count(ArrayKind::U8, 8), 1);

        strategy.get(ArrayKind::U8, 8).unwrap();
        // Zero entries are removed outright, not left at zero.
        assert_eq!(strategy.ledger_count(ArrayKind::U8, 8), 0);
    }

    #[test]
    fn test_ledger_tracks_eviction() {
        let mut strategy = SizeStrategy::new();
        strategy.put(PooledArray::allocate(ArrayKind::I64, 4));
        strategy.evict_one().unwrap();
        assert_eq!(strategy.ledger_count(ArrayKind::I64, 4), 0);
        assert!(strategy.evict_one().is_none());
    }

    #[test]
    #[should_panic(expected = "size ledger")]
    fn test_underflow_is_a_programming_error() {
        let mut strategy = SizeStrategy::new();
        strategy.put(PooledArray::allocate(ArrayKind::U8, 8));
        strategy.get(ArrayKind::U8, 8).unwrap();
        strategy.decrement(ArrayKind::U8, 8);
    }

    #[test]
    fn test_kinds_do_not_share_ledgers() {
        let mut strategy = SizeStrategy::new();
        strategy.put(PooledArray::allocate(ArrayKind::F32, 8));
        strategy.put(PooledArray::allocate(ArrayKind::I32, 8));

        assert_eq!(strategy.ledger_count(ArrayKind::F32, 8), 1);
        assert_eq!(strategy.ledger_count(ArrayKind::I32, 8), 1);

        strategy.get(ArrayKind::F32, 8).unwrap();
        assert_eq!(strategy.ledger_count(ArrayKind::F32, 8), 0);
        assert_eq!(strategy.ledger_count(ArrayKind::I32, 8), 1);
    }
}
