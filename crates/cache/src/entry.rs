//! Cache entry with access metadata

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use taleweave_core::{Artifact, Fingerprint};

/// A stored artifact and its usage history
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub fingerprint: Fingerprint,
    pub artifact: Artifact,
    /// Bytes charged against the cache's capacity
    pub size: u64,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
    pub use_count: u64,
}

impl CacheEntry {
    pub fn new(fingerprint: Fingerprint, artifact: Artifact, now: DateTime<Utc>) -> Self {
        Self {
            fingerprint,
            size: artifact.size_bytes(),
            artifact,
            created_at: now,
            last_used_at: now,
            use_count: 0,
        }
    }

    /// Record a hit
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_used_at = now;
        self.use_count += 1;
    }

    /// Whether the entry has outlived `ttl`, counted from creation
    pub fn is_expired(&self, ttl: Option<Duration>, now: DateTime<Utc>) -> bool {
        let Some(ttl) = ttl else {
            return false;
        };
        chrono::Duration::from_std(ttl)
            .map(|ttl| now.signed_duration_since(self.created_at) >= ttl)
            .unwrap_or(false)
    }
}
