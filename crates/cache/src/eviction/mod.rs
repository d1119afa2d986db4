//! Eviction policies for cache capacity management

mod lru;
mod traits;

pub use self::lru::LruPolicy;
pub use traits::EvictionPolicy;
