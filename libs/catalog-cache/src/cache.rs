//! The two logical response caches (spec.md §4.5 / C5): plugin discovery
//! and per-plugin capabilities. Each is a moka TTL cache; eviction on
//! overflow follows moka's admission policy rather than strict
//! insertion order (see DESIGN.md).

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use catalog_kit::CacheInvalidator;
use http::{HeaderMap, StatusCode};
use moka::future::Cache;

#[derive(Clone)]
pub struct CachedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[derive(Clone)]
pub struct ResponseCache {
    discovery: Cache<String, CachedResponse>,
    capabilities: Cache<String, CachedResponse>,
}

#[derive(Debug, Clone, Copy)]
pub struct ResponseCacheConfig {
    pub discovery_ttl: Duration,
    pub capabilities_ttl: Duration,
    pub max_entries: u64,
}

impl Default for ResponseCacheConfig {
    fn default() -> Self {
        Self {
            discovery_ttl: Duration::from_secs(10),
            capabilities_ttl: Duration::from_secs(30),
            max_entries: 1_000,
        }
    }
}

/// The only two endpoints spec.md §4.5 allows caching: both are safe,
/// read-only and carry no tenant-scoped entity data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBucket {
    Discovery,
    Capabilities,
}

impl ResponseCache {
    #[must_use]
    pub fn new(config: ResponseCacheConfig) -> Self {
        Self {
            discovery: Cache::builder()
                .max_capacity(config.max_entries)
                .time_to_live(config.discovery_ttl)
                .build(),
            capabilities: Cache::builder()
                .max_capacity(config.max_entries)
                .time_to_live(config.capabilities_ttl)
                .build(),
        }
    }

    fn bucket(&self, bucket: CacheBucket) -> &Cache<String, CachedResponse> {
        match bucket {
            CacheBucket::Discovery => &self.discovery,
            CacheBucket::Capabilities => &self.capabilities,
        }
    }

    pub async fn get(&self, bucket: CacheBucket, key: &str) -> Option<CachedResponse> {
        self.bucket(bucket).get(key).await
    }

    pub async fn put(&self, bucket: CacheBucket, key: String, response: CachedResponse) {
        self.bucket(bucket).insert(key, response).await;
    }

    /// Invalidates the whole discovery cache, per spec.md §4.5.
    pub fn invalidate_discovery(&self) {
        self.discovery.invalidate_all();
    }

    /// Invalidates the per-plugin capabilities entry, per spec.md §4.5.
    pub async fn invalidate_capabilities(&self, plugin: &str) {
        self.capabilities.invalidate(plugin).await;
    }
}

/// Lets a plugin bust the ambient response caches after a successful
/// source apply/refresh without depending on `ResponseCache` directly.
#[async_trait]
impl CacheInvalidator for ResponseCache {
    fn invalidate_discovery(&self) {
        ResponseCache::invalidate_discovery(self);
    }

    async fn invalidate_capabilities(&self, plugin: &str) {
        ResponseCache::invalidate_capabilities(self, plugin).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(body: &str) -> CachedResponse {
        CachedResponse {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Bytes::from(body.to_owned()),
        }
    }

    #[tokio::test]
    async fn stores_and_retrieves_per_bucket() {
        let cache = ResponseCache::new(ResponseCacheConfig::default());
        cache.put(CacheBucket::Discovery, "all".into(), response("a")).await;
        cache
            .put(CacheBucket::Capabilities, "model".into(), response("b"))
            .await;

        assert!(cache.get(CacheBucket::Discovery, "all").await.is_some());
        assert!(cache.get(CacheBucket::Capabilities, "model").await.is_some());
        assert!(cache.get(CacheBucket::Discovery, "model").await.is_none());
    }

    #[tokio::test]
    async fn invalidate_capabilities_is_per_plugin() {
        let cache = ResponseCache::new(ResponseCacheConfig::default());
        cache
            .put(CacheBucket::Capabilities, "model".into(), response("b"))
            .await;
        cache
            .put(CacheBucket::Capabilities, "mcp".into(), response("c"))
            .await;

        cache.invalidate_capabilities("model").await;
        assert!(cache.get(CacheBucket::Capabilities, "model").await.is_none());
        assert!(cache.get(CacheBucket::Capabilities, "mcp").await.is_some());
    }

    #[tokio::test]
    async fn invalidate_discovery_clears_whole_bucket() {
        let cache = ResponseCache::new(ResponseCacheConfig::default());
        cache.put(CacheBucket::Discovery, "all".into(), response("a")).await;
        cache.invalidate_discovery();
        cache.discovery.run_pending_tasks().await;
        assert!(cache.get(CacheBucket::Discovery, "all").await.is_none());
    }
}
