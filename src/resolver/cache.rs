//! LRU cache of resolved install orders, shared across a subsystem tree.
//!
//! Caches only the resolved `ordered_kinds`, never instantiated facets: two
//! subsystems with identical hook shapes would otherwise share live facet
//! instances through a cached `Plan`, aliasing state that should be
//! per-subsystem. `SubsystemBuilder::plan` always re-instantiates facets
//! from hooks in the (possibly cached) order.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::facet::FacetKind;

const DEFAULT_MAX_ENTRIES: usize = 50;

struct Inner {
    entries: HashMap<u64, Vec<FacetKind>>,
    recency: Vec<u64>,
    max_entries: usize,
}

/// Reference-counted (via `Arc` at call sites) LRU keyed by
/// [`super::dependency::fingerprint`]. Read-mostly: builds consult it first
/// and only `put` on a miss, after a successful resolve.
pub struct DependencyGraphCache {
    inner: Mutex<Inner>,
}

impl DependencyGraphCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                recency: Vec::new(),
                max_entries,
            }),
        }
    }

    pub fn get(&self, fingerprint: u64) -> Option<Vec<FacetKind>> {
        let mut inner = self.inner.lock();
        let hit = inner.entries.get(&fingerprint).cloned();
        if hit.is_some() {
            inner.recency.retain(|fp| *fp != fingerprint);
            inner.recency.push(fingerprint);
        }
        hit
    }

    /// Pure side effect: never mutates the value being cached, only the
    /// cache's own bookkeeping.
    pub fn put(&self, fingerprint: u64, ordered_kinds: Vec<FacetKind>) {
        let mut inner = self.inner.lock();
        if !inner.entries.contains_key(&fingerprint) && inner.entries.len() >= inner.max_entries {
            if let Some(oldest) = inner.recency.first().copied() {
                inner.recency.remove(0);
                inner.entries.remove(&oldest);
            }
        }
        inner.entries.insert(fingerprint, ordered_kinds);
        inner.recency.retain(|fp| *fp != fingerprint);
        inner.recency.push(fingerprint);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DependencyGraphCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_round_trips() {
        let cache = DependencyGraphCache::default();
        cache.put(1, vec![FacetKind::Router]);
        assert_eq!(cache.get(1), Some(vec![FacetKind::Router]));
    }

    #[test]
    fn evicts_least_recently_used_when_full() {
        let cache = DependencyGraphCache::new(2);
        cache.put(1, vec![FacetKind::Router]);
        cache.put(2, vec![FacetKind::Queue]);
        cache.get(1);
        cache.put(3, vec![FacetKind::Statistics]);
        assert!(cache.get(2).is_none());
        assert!(cache.get(1).is_some());
        assert!(cache.get(3).is_some());
    }

    #[test]
    fn miss_returns_none() {
        let cache = DependencyGraphCache::default();
        assert!(cache.get(42).is_none());
    }
}
