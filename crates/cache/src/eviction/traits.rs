//! Core eviction policy trait definition

/// Tracks recency and size so the store knows what to evict
///
/// The store calls these hooks while it holds the lock for `key`, so a
/// policy never sees interleaved updates for the same key.
pub trait EvictionPolicy: Send + Sync {
    /// Record a hit on a key
    fn on_access(&self, key: &str);

    /// Record insertion of a key
    fn on_insert(&self, key: &str, size: u64);

    /// Record removal of a key
    fn on_remove(&self, key: &str);

    /// Tracked keys, best eviction candidate first
    fn eviction_candidates(&self) -> Vec<String>;

    /// Whether the tracked keys exceed the configured capacity
    fn is_over_capacity(&self) -> bool;

    /// Forget every tracked key
    fn clear(&self);

    /// Bytes held by the tracked keys
    fn memory_usage(&self) -> u64;

    /// Number of tracked keys
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
