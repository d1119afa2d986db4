//! Content-addressable artifact cache
//!
//! Artifacts are keyed by the fingerprint of the inputs that produced them.
//! Entries are written once and never overwritten; recency metadata is the
//! only thing that changes after a write.

pub mod entry;
pub mod errors;
pub mod eviction;
pub mod fingerprint;
pub mod stats;
pub mod store;

pub use entry::CacheEntry;
pub use errors::CacheError;
pub use eviction::{EvictionPolicy, LruPolicy};
pub use fingerprint::{canonical_json, fingerprint_value, task_fingerprint};
pub use stats::CacheStats;
pub use store::{CacheConfig, CachePin, ContentCache, PutOutcome};
