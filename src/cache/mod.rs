//! Cache Module
//!
//! Write-through caching over a pluggable key-value backend: Redis, or an
//! in-memory backend that supports TTL expiration and LRU eviction.

mod backend;
mod entry;
mod lru;
mod memory;
mod redis_backend;
mod stats;
mod store;


// Re-export public types
pub use backend::{Command, KeyTtl, KvBackend, Reply};
pub use entry::CacheEntry;
pub use lru::LruTracker;
pub use memory::MemoryBackend;
pub use redis_backend::RedisBackend;
pub use stats::CacheStats;
pub use store::{
    CacheOptions, CacheStore, DEFAULT_MAX_RETRIES, DEFAULT_PREFIX, DEFAULT_RETRY_DELAY, DEFAULT_TTL,
};
