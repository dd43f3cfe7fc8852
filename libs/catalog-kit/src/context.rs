//! Per-plugin context handed to `init`, mirroring `modkit::ModuleCtx`: a
//! slice of config scoped to this plugin plus the cross-cutting services it
//! may need, with no visibility into sibling plugins.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::invalidation::{CacheInvalidator, NoopCacheInvalidator};
use crate::registry::RefresherRegistry;

/// Namespaced slice of the unified `CatalogSources` document for one
/// plugin, plus that plugin's own `plugins.<name>` config section.
#[derive(Debug, Clone, Default)]
pub struct PluginConfig {
    pub sources: serde_json::Value,
    pub settings: serde_json::Value,
}

impl PluginConfig {
    /// Deserializes the plugin's `settings` section, falling back to
    /// `T::default()` when absent (lenient loading, matching
    /// `modkit::config::module_config_or_default`).
    pub fn settings_or_default<T>(&self) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned + Default,
    {
        if self.settings.is_null() {
            return Ok(T::default());
        }
        Ok(serde_json::from_value(self.settings.clone())?)
    }
}

/// Context passed to `CatalogPlugin::init`.
pub struct PluginCtx {
    pub plugin_name: &'static str,
    pub config: PluginConfig,
    pub cancel: CancellationToken,
    pub refreshers: Arc<RefresherRegistry>,
    /// Bust the discovery/capabilities response caches (spec.md §4.5). A
    /// plugin stores this and calls it after every successful source
    /// apply/enable/delete/refresh.
    pub invalidator: Arc<dyn CacheInvalidator>,
}

impl PluginCtx {
    #[must_use]
    pub fn new(
        plugin_name: &'static str,
        config: PluginConfig,
        cancel: CancellationToken,
        refreshers: Arc<RefresherRegistry>,
    ) -> Self {
        Self {
            plugin_name,
            config,
            cancel,
            refreshers,
            invalidator: Arc::new(NoopCacheInvalidator),
        }
    }

    #[must_use]
    pub fn with_invalidator(mut self, invalidator: Arc<dyn CacheInvalidator>) -> Self {
        self.invalidator = invalidator;
        self
    }
}
