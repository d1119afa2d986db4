//! The content-addressable store
//!
//! Every mutation of a fingerprint (`put`, `touch`, pin, evict) happens while
//! holding the map shard that owns it, so concurrent writers to one
//! fingerprint serialize while unrelated fingerprints proceed in parallel.
//! Policy bookkeeping is updated under the same shard lock.

use crate::entry::CacheEntry;
use crate::errors::CacheError;
use crate::eviction::{EvictionPolicy, LruPolicy};
use crate::stats::{CacheStats, StatsCounters};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use taleweave_core::{Artifact, Fingerprint};

/// Capacity and expiry settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub max_entries: usize,
    pub max_bytes: u64,
    pub ttl: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1024,
            max_bytes: 256 * 1024 * 1024,
            ttl: None,
        }
    }
}

impl CacheConfig {
    pub fn validate(&self) -> Result<(), CacheError> {
        if self.max_entries == 0 {
            return Err(CacheError::configuration("max_entries must be positive"));
        }
        if self.max_bytes == 0 {
            return Err(CacheError::configuration("max_bytes must be positive"));
        }
        if self.ttl.is_some_and(|ttl| ttl.is_zero()) {
            return Err(CacheError::configuration("ttl must be positive when set"));
        }
        Ok(())
    }
}

/// Result of a successful `put`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Inserted,
    /// Byte-identical content was already stored; nothing changed
    AlreadyPresent,
}

#[derive(Default)]
struct Slot {
    entry: Option<CacheEntry>,
    /// Outstanding `CachePin`s; a pinned slot is never evicted
    pins: usize,
}

/// Thread-safe content-addressable artifact cache
pub struct ContentCache {
    slots: DashMap<String, Slot>,
    policy: Box<dyn EvictionPolicy>,
    config: CacheConfig,
    stats: StatsCounters,
}

impl ContentCache {
    pub fn new(config: CacheConfig) -> Result<Self, CacheError> {
        let policy = LruPolicy::new(config.max_entries, config.max_bytes);
        Self::with_policy(config, Box::new(policy))
    }

    pub fn with_policy(
        config: CacheConfig,
        policy: Box<dyn EvictionPolicy>,
    ) -> Result<Self, CacheError> {
        config.validate()?;
        Ok(Self {
            slots: DashMap::new(),
            policy,
            config,
            stats: StatsCounters::default(),
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Look up an artifact; a hit also refreshes its recency
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<Artifact> {
        self.get_at(fingerprint, Utc::now())
    }

    /// Store an artifact under its fingerprint
    ///
    /// Writing identical content twice is a no-op. Writing different content
    /// for a stored fingerprint fails and leaves the stored artifact in place.
    pub fn put(
        &self,
        fingerprint: &Fingerprint,
        artifact: Artifact,
    ) -> Result<PutOutcome, CacheError> {
        self.put_at(fingerprint, artifact, Utc::now())
    }

    /// Refresh recency without reading; returns whether the entry exists
    pub fn touch(&self, fingerprint: &Fingerprint) -> bool {
        let now = Utc::now();
        let Some(mut slot) = self.slots.get_mut(fingerprint.as_str()) else {
            return false;
        };
        match slot.entry.as_mut() {
            Some(entry) if !entry.is_expired(self.config.ttl, now) => {
                entry.touch(now);
                self.policy.on_access(fingerprint.as_str());
                true
            }
            _ => false,
        }
    }

    /// Protect a fingerprint from eviction until the returned guard drops
    ///
    /// The fingerprint does not need to be present yet; pinning before a
    /// lookup keeps a concurrent eviction from racing the lookup and the
    /// following `put`.
    pub fn pin(self: &Arc<Self>, fingerprint: &Fingerprint) -> CachePin {
        self.slots
            .entry(fingerprint.as_str().to_owned())
            .or_default()
            .pins += 1;
        CachePin {
            cache: Arc::clone(self),
            key: fingerprint.as_str().to_owned(),
        }
    }

    pub fn is_pinned(&self, fingerprint: &Fingerprint) -> bool {
        self.slots
            .get(fingerprint.as_str())
            .is_some_and(|slot| slot.pins > 0)
    }

    /// Metadata for a stored entry
    pub fn entry(&self, fingerprint: &Fingerprint) -> Option<CacheEntry> {
        self.slots
            .get(fingerprint.as_str())
            .and_then(|slot| slot.entry.clone())
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.slots
            .get(fingerprint.as_str())
            .is_some_and(|slot| slot.entry.is_some())
    }

    /// Drop an entry regardless of recency
    pub fn remove(&self, fingerprint: &Fingerprint) -> Option<Artifact> {
        let key = fingerprint.as_str();
        let entry = {
            let mut slot = self.slots.get_mut(key)?;
            let entry = slot.entry.take()?;
            self.policy.on_remove(key);
            entry
        };
        self.slots
            .remove_if(key, |_, slot| slot.pins == 0 && slot.entry.is_none());
        Some(entry.artifact)
    }

    /// Drop every entry; pins survive
    pub fn clear(&self) {
        self.slots.retain(|key, slot| {
            if slot.entry.take().is_some() {
                self.policy.on_remove(key);
            }
            slot.pins > 0
        });
    }

    /// Evict least recently used, unpinned entries until within capacity
    ///
    /// Returns the number of entries evicted. Safe to call concurrently with
    /// reads and writes.
    pub fn evict_if_needed(&self) -> usize {
        if !self.policy.is_over_capacity() {
            return 0;
        }

        let mut evicted = 0;
        for key in self.policy.eviction_candidates() {
            if !self.policy.is_over_capacity() {
                break;
            }
            if self.try_evict(&key) {
                evicted += 1;
            }
        }

        if evicted > 0 {
            tracing::debug!(
                evicted,
                entries = self.policy.len(),
                bytes = self.policy.memory_usage(),
                "cache_evicted"
            );
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.policy.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policy.is_empty()
    }

    pub fn bytes(&self) -> u64 {
        self.policy.memory_usage()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot(self.len(), self.bytes())
    }

    fn get_at(&self, fingerprint: &Fingerprint, now: DateTime<Utc>) -> Option<Artifact> {
        let key = fingerprint.as_str();
        let mut expired = false;
        let hit = match self.slots.get_mut(key) {
            Some(mut slot) => match slot.entry.as_mut() {
                Some(entry) if entry.is_expired(self.config.ttl, now) => {
                    expired = true;
                    None
                }
                Some(entry) => {
                    entry.touch(now);
                    self.policy.on_access(key);
                    Some(entry.artifact.clone())
                }
                None => None,
            },
            None => None,
        };

        if expired {
            self.expire(key, now);
        }
        if hit.is_some() {
            StatsCounters::bump(&self.stats.hits);
        } else {
            StatsCounters::bump(&self.stats.misses);
        }
        hit
    }

    fn put_at(
        &self,
        fingerprint: &Fingerprint,
        artifact: Artifact,
        now: DateTime<Utc>,
    ) -> Result<PutOutcome, CacheError> {
        let key = fingerprint.as_str();
        {
            let mut slot = self.slots.entry(key.to_owned()).or_default();
            if let Some(existing) = slot.entry.as_ref() {
                if !existing.is_expired(self.config.ttl, now) {
                    if existing.artifact == artifact {
                        return Ok(PutOutcome::AlreadyPresent);
                    }
                    let err = CacheError::ConsistencyViolation {
                        fingerprint: fingerprint.clone(),
                        existing_bytes: existing.size,
                        incoming_bytes: artifact.size_bytes(),
                    };
                    StatsCounters::bump(&self.stats.violations);
                    tracing::error!(fingerprint = %fingerprint, error = %err, "cache_consistency_violation");
                    return Err(err);
                }
                StatsCounters::bump(&self.stats.expirations);
            }

            let entry = CacheEntry::new(fingerprint.clone(), artifact, now);
            self.policy.on_insert(key, entry.size);
            slot.entry = Some(entry);
        }

        StatsCounters::bump(&self.stats.inserts);
        tracing::trace!(fingerprint = %fingerprint.short(), "cache_put");
        self.evict_if_needed();
        Ok(PutOutcome::Inserted)
    }

    fn expire(&self, key: &str, now: DateTime<Utc>) {
        if let Entry::Occupied(mut occupied) = self.slots.entry(key.to_owned()) {
            let slot = occupied.get_mut();
            let still_expired = slot
                .entry
                .as_ref()
                .is_some_and(|entry| entry.is_expired(self.config.ttl, now));
            if !still_expired {
                return;
            }
            slot.entry = None;
            self.policy.on_remove(key);
            StatsCounters::bump(&self.stats.expirations);
            if slot.pins == 0 {
                occupied.remove();
            }
        }
    }

    fn try_evict(&self, key: &str) -> bool {
        match self.slots.entry(key.to_owned()) {
            Entry::Occupied(occupied) => {
                if occupied.get().pins > 0 {
                    return false;
                }
                self.policy.on_remove(key);
                occupied.remove();
                StatsCounters::bump(&self.stats.evictions);
                true
            }
            Entry::Vacant(_) => false,
        }
    }

    fn unpin(&self, key: &str) {
        if let Entry::Occupied(mut occupied) = self.slots.entry(key.to_owned()) {
            let slot = occupied.get_mut();
            slot.pins = slot.pins.saturating_sub(1);
            if slot.pins == 0 && slot.entry.is_none() {
                occupied.remove();
            }
        }
        self.evict_if_needed();
    }
}

impl fmt::Debug for ContentCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentCache")
            .field("config", &self.config)
            .field("entries", &self.len())
            .field("bytes", &self.bytes())
            .finish()
    }
}

/// Guard keeping one fingerprint pinned
#[derive(Debug)]
pub struct CachePin {
    cache: Arc<ContentCache>,
    key: String,
}

impl Drop for CachePin {
    fn drop(&mut self) {
        self.cache.unpin(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::fingerprint_value;
    use serde_json::json;

    fn fp(n: u32) -> Fingerprint {
        fingerprint_value(&json!({ "n": n }))
    }

    fn cache(max_entries: usize) -> Arc<ContentCache> {
        Arc::new(
            ContentCache::new(CacheConfig {
                max_entries,
                ..CacheConfig::default()
            })
            .unwrap(),
        )
    }

    #[test]
    fn test_miss_then_hit() {
        let cache = cache(8);
        assert_eq!(cache.get(&fp(1)), None);
        cache.put(&fp(1), Artifact::text("once")).unwrap();
        assert_eq!(cache.get(&fp(1)), Some(Artifact::text("once")));

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.inserts), (1, 1, 1));
        assert_eq!(cache.entry(&fp(1)).unwrap().use_count, 1);
    }

    #[test]
    fn test_identical_put_is_idempotent() {
        let cache = cache(8);
        let artifact = Artifact::url("https://cdn.test/page-1.png");
        assert_eq!(
            cache.put(&fp(1), artifact.clone()).unwrap(),
            PutOutcome::Inserted
        );
        assert_eq!(
            cache.put(&fp(1), artifact.clone()).unwrap(),
            PutOutcome::AlreadyPresent
        );
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().inserts, 1);
    }

    #[test]
    fn test_conflicting_put_keeps_original() {
        let cache = cache(8);
        let a1 = Artifact::text("first");
        let a2 = Artifact::text("second");
        cache.put(&fp(1), a1.clone()).unwrap();

        let err = cache.put(&fp(1), a2).unwrap_err();
        assert!(matches!(err, CacheError::ConsistencyViolation { .. }));
        assert_eq!(cache.get(&fp(1)), Some(a1));
        assert_eq!(cache.stats().consistency_violations, 1);

        let core: taleweave_core::Error = err.into();
        assert!(matches!(core, taleweave_core::Error::CacheConsistency { .. }));
    }

    #[test]
    fn test_least_recently_used_is_evicted_first() {
        let cache = cache(2);
        cache.put(&fp(1), Artifact::text("a")).unwrap();
        cache.put(&fp(2), Artifact::text("b")).unwrap();
        assert!(cache.get(&fp(1)).is_some());

        cache.put(&fp(3), Artifact::text("c")).unwrap();
        assert!(cache.contains(&fp(1)));
        assert!(!cache.contains(&fp(2)));
        assert!(cache.contains(&fp(3)));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_byte_capacity_triggers_eviction() {
        let cache = ContentCache::new(CacheConfig {
            max_entries: 100,
            max_bytes: 64,
            ttl: None,
        })
        .unwrap();
        cache.put(&fp(1), Artifact::inline("image/png", vec![0u8; 40])).unwrap();
        cache.put(&fp(2), Artifact::inline("image/png", vec![1u8; 40])).unwrap();

        assert!(!cache.contains(&fp(1)));
        assert!(cache.contains(&fp(2)));
        assert!(cache.bytes() <= 64);
    }

    #[test]
    fn test_pinned_entry_survives_eviction() {
        let cache = cache(2);
        let pin = cache.pin(&fp(1));
        cache.put(&fp(1), Artifact::text("a")).unwrap();
        cache.put(&fp(2), Artifact::text("b")).unwrap();
        cache.put(&fp(3), Artifact::text("c")).unwrap();

        assert!(cache.contains(&fp(1)));
        assert!(!cache.contains(&fp(2)));
        assert!(cache.contains(&fp(3)));
        assert!(cache.is_pinned(&fp(1)));

        drop(pin);
        assert!(!cache.is_pinned(&fp(1)));
        assert!(cache.contains(&fp(1)));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_pin_without_entry_leaves_nothing_behind() {
        let cache = cache(2);
        let pin = cache.pin(&fp(9));
        assert!(cache.is_pinned(&fp(9)));
        drop(pin);
        assert!(!cache.is_pinned(&fp(9)));
        assert!(cache.slots.is_empty());
    }

    #[test]
    fn test_expired_entry_reads_as_miss_and_can_be_replaced() {
        let cache = ContentCache::new(CacheConfig {
            ttl: Some(Duration::from_secs(60)),
            ..CacheConfig::default()
        })
        .unwrap();
        let t0 = Utc::now();
        cache.put_at(&fp(1), Artifact::text("old"), t0).unwrap();
        assert!(cache.get_at(&fp(1), t0 + chrono::Duration::seconds(30)).is_some());

        let later = t0 + chrono::Duration::seconds(61);
        assert!(cache.get_at(&fp(1), later).is_none());
        assert!(!cache.contains(&fp(1)));

        cache.put_at(&fp(1), Artifact::text("old"), t0).unwrap();
        let outcome = cache
            .put_at(&fp(1), Artifact::text("new"), later)
            .unwrap();
        assert_eq!(outcome, PutOutcome::Inserted);
        assert_eq!(cache.stats().expirations, 2);
    }

    #[test]
    fn test_remove_and_clear() {
        let cache = cache(8);
        cache.put(&fp(1), Artifact::text("a")).unwrap();
        cache.put(&fp(2), Artifact::text("b")).unwrap();
        assert_eq!(cache.remove(&fp(1)), Some(Artifact::text("a")));
        assert_eq!(cache.remove(&fp(1)), None);
        assert!(cache.touch(&fp(2)));

        let _pin = cache.pin(&fp(2));
        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.is_pinned(&fp(2)));
        assert!(!cache.touch(&fp(2)));
    }

    #[test]
    fn test_concurrent_identical_puts_converge() {
        let cache = cache(8);
        let artifact = Artifact::text("shared");
        let outcomes: Vec<PutOutcome> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let cache = &cache;
                    let artifact = artifact.clone();
                    scope.spawn(move || cache.put(&fp(1), artifact).unwrap())
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let inserted = outcomes
            .iter()
            .filter(|o| **o == PutOutcome::Inserted)
            .count();
        assert_eq!(inserted, 1);
        assert_eq!(cache.get(&fp(1)), Some(artifact));
    }

    #[test]
    fn test_concurrent_conflicting_puts_keep_the_winner() {
        let cache = cache(8);
        let results: Vec<(usize, Result<PutOutcome, CacheError>)> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|n| {
                    let cache = &cache;
                    let artifact = Artifact::text(format!("writer {n}"));
                    scope.spawn(move || (n, cache.put(&fp(1), artifact)))
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let winners: Vec<usize> = results
            .iter()
            .filter(|(_, result)| matches!(result, Ok(PutOutcome::Inserted)))
            .map(|(n, _)| *n)
            .collect();
        assert_eq!(winners.len(), 1);
        assert!(results
            .iter()
            .filter(|(n, _)| *n != winners[0])
            .all(|(_, result)| matches!(result, Err(CacheError::ConsistencyViolation { .. }))));

        assert_eq!(
            cache.get(&fp(1)),
            Some(Artifact::text(format!("writer {}", winners[0])))
        );
        let stats = cache.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.inserts, 1);
        assert_eq!(stats.consistency_violations, 7);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let err = ContentCache::new(CacheConfig {
            max_entries: 0,
            ..CacheConfig::default()
        })
        .unwrap_err();
        assert!(matches!(err, CacheError::Configuration { .. }));
    }
}
