//! LRU (Least Recently Used) eviction policy implementation

use crate::eviction::traits::EvictionPolicy;
use ::lru::LruCache;
use parking_lot::Mutex;

/// LRU eviction bounded by entry count and total bytes
pub struct LruPolicy {
    inner: Mutex<Inner>,
    max_entries: usize,
    max_bytes: u64,
}

struct Inner {
    /// Key to size, most recently used first
    order: LruCache<String, u64>,
    total_size: u64,
}

impl LruPolicy {
    pub fn new(max_entries: usize, max_bytes: u64) -> Self {
        Self {
            inner: Mutex::new(Inner {
                order: LruCache::unbounded(),
                total_size: 0,
            }),
            max_entries,
            max_bytes,
        }
    }
}

impl EvictionPolicy for LruPolicy {
    fn on_access(&self, key: &str) {
        // `get` promotes the key to most recently used
        self.inner.lock().order.get(key);
    }

    fn on_insert(&self, key: &str, size: u64) {
        let mut inner = self.inner.lock();
        if let Some(previous) = inner.order.put(key.to_owned(), size) {
            inner.total_size -= previous;
        }
        inner.total_size += size;
    }

    fn on_remove(&self, key: &str) {
        let mut inner = self.inner.lock();
        if let Some(size) = inner.order.pop(key) {
            inner.total_size -= size;
        }
    }

    fn eviction_candidates(&self) -> Vec<String> {
        let inner = self.inner.lock();
        inner.order.iter().rev().map(|(key, _)| key.clone()).collect()
    }

    fn is_over_capacity(&self) -> bool {
        let inner = self.inner.lock();
        inner.order.len() > self.max_entries || inner.total_size > self.max_bytes
    }

    fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.order.clear();
        inner.total_size = 0;
    }

    fn memory_usage(&self) -> u64 {
        self.inner.lock().total_size
    }

    fn len(&self) -> usize {
        self.inner.lock().order.len()
    }
}
