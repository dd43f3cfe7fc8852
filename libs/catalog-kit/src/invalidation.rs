//! Cache-invalidation hook threaded into every plugin so a successful
//! source apply/refresh can bust the ambient discovery/capabilities
//! response caches (spec.md §4.5) without this crate depending on
//! `catalog-cache` (which instead implements this trait over its own
//! `ResponseCache`).

use async_trait::async_trait;

#[async_trait]
pub trait CacheInvalidator: Send + Sync {
    fn invalidate_discovery(&self);
    async fn invalidate_capabilities(&self, plugin: &str);
}

/// Used where no cache is wired in (tests, `PluginCtx::default`-style setup).
#[derive(Default)]
pub struct NoopCacheInvalidator;

#[async_trait]
impl CacheInvalidator for NoopCacheInvalidator {
    fn invalidate_discovery(&self) {}
    async fn invalidate_capabilities(&self, _plugin: &str) {}
}
