//! Redis-backed cache store, cached repository decorator, cache warmer, and
//! cross-replica invalidation listener.

pub mod decorator;
pub mod listener;
pub mod redis_store;
pub mod warmer;

pub use decorator::CachedFacilityRepository;
pub use listener::{spawn_invalidation_listener, InvalidationListenerHandle};
pub use redis_store::RedisCacheStore;
pub use warmer::{spawn_cache_warmer, CacheWarmerHandle};
