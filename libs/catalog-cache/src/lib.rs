//! LRU+TTL response cache for the catalog discovery endpoints
//! (spec.md §4.5 / C5).

pub mod cache;
pub mod middleware;

pub use cache::{CacheBucket, CachedResponse, ResponseCache, ResponseCacheConfig};
pub use middleware::cache_layer;
