//! Wires the model entity store, source management and refresh contracts
//! into the single `ModelCatalogPlugin` the runtime registers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use catalog_kit::capabilities::{Action, CapabilitiesV2, ColumnHint, DetailSection, Entity, FilterField, PluginMeta};
use catalog_kit::context::PluginCtx;
use catalog_kit::contracts::{
    CapabilitiesV2Provider, CatalogPlugin, Diagnostics, DiagnosticsProvider, PluginRefresher,
    RefreshOutcome, RestfulPlugin, SourceDiagnostics, SourceManager,
};
use catalog_kit::invalidation::{CacheInvalidator, NoopCacheInvalidator};
use catalog_kit::source::{Source, SourceCollection, SourceConfig};
use parking_lot::RwLock;

use crate::config::ModelCatalogSettings;
use crate::model::Model;
use crate::store::load_source_entities;

const PLUGIN_NAME: &str = "model";
const PLUGIN_VERSION: &str = "v1alpha1";

#[derive(Default, Clone)]
struct SourceMeta {
    last_refresh_time: Option<String>,
    last_refresh_duration_ms: Option<u64>,
    error: Option<String>,
}

struct Inner {
    sources: SourceCollection<Model>,
    meta: RwLock<HashMap<String, SourceMeta>>,
    last_refresh: RwLock<Option<String>>,
    invalidator: RwLock<Arc<dyn CacheInvalidator>>,
}

#[derive(Clone)]
pub struct ModelCatalogPlugin {
    inner: Arc<Inner>,
}

impl Default for ModelCatalogPlugin {
    fn default() -> Self {
        Self {
            inner: Arc::new(Inner {
                sources: SourceCollection::new(),
                meta: RwLock::new(HashMap::new()),
                last_refresh: RwLock::new(None),
                invalidator: RwLock::new(Arc::new(NoopCacheInvalidator)),
            }),
        }
    }
}

impl ModelCatalogPlugin {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn sources(&self) -> &SourceCollection<Model> {
        &self.inner.sources
    }

    /// Busts the discovery/capabilities response caches (spec.md §4.5)
    /// after a successful source apply/enable/delete/refresh.
    async fn invalidate_caches(&self) {
        let invalidator = self.inner.invalidator.read().clone();
        invalidator.invalidate_discovery();
        invalidator.invalidate_capabilities(PLUGIN_NAME).await;
    }

    fn refresh_one_locked(&self, source: &Source) -> anyhow::Result<RefreshOutcome> {
        let start = Instant::now();
        let result = load_source_entities(&SourceConfig {
            id: source.id.clone(),
            name: source.name.clone(),
            source_type: source.source_type.clone(),
            enabled: source.enabled,
            labels: source.labels.clone(),
            properties: source.properties.clone(),
            origin: source.origin.clone(),
        });
        let duration_ms = start.elapsed().as_millis() as u64;
        let mut meta = self.inner.meta.write();
        let entry = meta.entry(source.id.clone()).or_default();
        entry.last_refresh_time = Some(chrono::Utc::now().to_rfc3339());
        entry.last_refresh_duration_ms = Some(duration_ms);

        match result {
            Ok(entities) => {
                entry.error = None;
                let (loaded, removed) = self.inner.sources.merge(&source.id, entities);
                Ok(RefreshOutcome {
                    entities_loaded: loaded,
                    entities_removed: removed,
                    duration_ms,
                    message: "ok".to_owned(),
                })
            }
            Err(err) => {
                entry.error = Some(err.to_string());
                Err(err)
            }
        }
    }
}

#[async_trait]
impl CatalogPlugin for ModelCatalogPlugin {
    fn name(&self) -> &'static str {
        PLUGIN_NAME
    }

    fn version(&self) -> &'static str {
        PLUGIN_VERSION
    }

    fn description(&self) -> &'static str {
        "Catalog of model artifacts sourced from YAML files"
    }

    async fn init(&self, ctx: &PluginCtx) -> anyhow::Result<()> {
        *self.inner.invalidator.write() = ctx.invalidator.clone();
        let _settings: ModelCatalogSettings = ctx.config.settings_or_default()?;
        if ctx.config.sources.is_null() {
            return Ok(());
        }
        let entry: catalog_kit::yaml::CatalogEntry = serde_json::from_value(ctx.config.sources.clone())?;
        for source_cfg in entry.sources {
            if !source_cfg.enabled {
                self.inner.sources.upsert_source(source_cfg.clone().into());
                continue;
            }
            self.inner.sources.upsert_source(source_cfg.clone().into());
            let source: Source = source_cfg.into();
            if let Err(err) = self.refresh_one_locked(&source) {
                tracing::warn!(source = %source.id, error = %err, "initial model source load failed");
            }
        }
        *self.inner.last_refresh.write() = Some(chrono::Utc::now().to_rfc3339());
        Ok(())
    }

    fn entity_kinds(&self) -> Vec<String> {
        vec!["Model".to_owned()]
    }
}

impl RestfulPlugin for ModelCatalogPlugin {
    fn register_routes(&self, _router: axum::Router) -> anyhow::Result<axum::Router> {
        Ok(crate::handlers::router(Arc::new(self.clone())))
    }
}

#[async_trait]
impl SourceManager for ModelCatalogPlugin {
    async fn list_sources(&self) -> Vec<Source> {
        self.inner.sources.list_sources()
    }

    async fn validate_source(&self, source: &SourceConfig) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if source.id.trim().is_empty() {
            errors.push("id must not be empty".to_owned());
        }
        if source.name.trim().is_empty() {
            errors.push("name must not be empty".to_owned());
        }
        if source.source_type != "file" {
            errors.push(format!("unsupported source type '{}'", source.source_type));
        }
        if source.properties.get("path").and_then(serde_json::Value::as_str).is_none() {
            errors.push("properties.path is required".to_owned());
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    async fn apply_source(&self, source: SourceConfig) -> anyhow::Result<()> {
        self.inner.sources.upsert_source(source.clone().into());
        let src: Source = source.into();
        if src.enabled {
            self.refresh_one_locked(&src)?;
        }
        self.invalidate_caches().await;
        Ok(())
    }

    async fn enable_source(&self, id: &str, enabled: bool) -> anyhow::Result<()> {
        let mut source = self
            .inner
            .sources
            .get_source(id)
            .ok_or_else(|| anyhow::anyhow!("source '{id}' not found"))?;
        source.enabled = enabled;
        self.inner.sources.upsert_source(source.clone());
        if enabled {
            self.refresh_one_locked(&source)?;
        }
        self.invalidate_caches().await;
        Ok(())
    }

    async fn delete_source(&self, id: &str) -> anyhow::Result<()> {
        if self.inner.sources.get_source(id).is_none() {
            anyhow::bail!("source '{id}' not found");
        }
        self.inner.sources.remove_source(id);
        self.inner.meta.write().remove(id);
        self.invalidate_caches().await;
        Ok(())
    }
}

#[async_trait]
impl PluginRefresher for ModelCatalogPlugin {
    async fn refresh(&self, source_id: &str) -> anyhow::Result<RefreshOutcome> {
        let source = self
            .inner
            .sources
            .get_source(source_id)
            .ok_or_else(|| anyhow::anyhow!("source '{source_id}' not found"))?;
        let outcome = self.refresh_one_locked(&source)?;
        *self.inner.last_refresh.write() = Some(chrono::Utc::now().to_rfc3339());
        self.invalidate_caches().await;
        Ok(outcome)
    }

    async fn refresh_all(&self) -> anyhow::Result<RefreshOutcome> {
        let mut total = RefreshOutcome::default();
        let mut last_error = None;
        for source in self.inner.sources.list_sources() {
            if !source.enabled {
                continue;
            }
            match self.refresh_one_locked(&source) {
                Ok(outcome) => {
                    total.entities_loaded += outcome.entities_loaded;
                    total.entities_removed += outcome.entities_removed;
                    total.duration_ms += outcome.duration_ms;
                }
                Err(err) => last_error = Some(err.to_string()),
            }
        }
        *self.inner.last_refresh.write() = Some(chrono::Utc::now().to_rfc3339());
        total.message = last_error.unwrap_or_else(|| "ok".to_owned());
        self.invalidate_caches().await;
        Ok(total)
    }
}

#[async_trait]
impl DiagnosticsProvider for ModelCatalogPlugin {
    async fn diagnostics(&self) -> Diagnostics {
        let meta = self.inner.meta.read();
        let sources = self
            .inner
            .sources
            .list_sources()
            .into_iter()
            .map(|s| {
                let m = meta.get(&s.id).cloned().unwrap_or_default();
                SourceDiagnostics {
                    id: s.id.clone(),
                    name: s.name,
                    state: if m.error.is_some() { "error".to_owned() } else { "ready".to_owned() },
                    entity_count: self.inner.sources.entity_count(&s.id) as u64,
                    last_refresh_time: m.last_refresh_time,
                    last_refresh_duration_ms: m.last_refresh_duration_ms,
                    error: m.error,
                }
            })
            .collect::<Vec<_>>();
        let errors = sources.iter().filter_map(|s| s.error.clone()).collect();
        Diagnostics {
            plugin_name: PLUGIN_NAME.to_owned(),
            sources,
            last_refresh: self.inner.last_refresh.read().clone(),
            errors,
        }
    }
}

impl CapabilitiesV2Provider for ModelCatalogPlugin {
    fn capabilities_v2(&self) -> CapabilitiesV2 {
        CapabilitiesV2 {
            schema_version: "v2".to_owned(),
            plugin: PluginMeta {
                name: PLUGIN_NAME.to_owned(),
                version: PLUGIN_VERSION.to_owned(),
                description: self.description().to_owned(),
            },
            entities: vec![Entity {
                kind: "Model".to_owned(),
                plural: "models".to_owned(),
                list_path: "/models".to_owned(),
                get_path: "/models/{name}".to_owned(),
                columns: vec![
                    ColumnHint { field: "name".to_owned(), label: "Name".to_owned(), sortable: true },
                    ColumnHint { field: "provider".to_owned(), label: "Provider".to_owned(), sortable: true },
                    ColumnHint { field: "task".to_owned(), label: "Task".to_owned(), sortable: false },
                ],
                filter_fields: vec![
                    FilterField {
                        field: "provider".to_owned(),
                        operators: vec!["=".to_owned(), "!=".to_owned(), "LIKE".to_owned()],
                        options: vec![],
                    },
                    FilterField {
                        field: "task".to_owned(),
                        operators: vec!["=".to_owned(), "!=".to_owned()],
                        options: vec![],
                    },
                ],
                detail_sections: vec![DetailSection {
                    id: "overview".to_owned(),
                    title: "Overview".to_owned(),
                    fields: vec!["name".to_owned(), "provider".to_owned(), "task".to_owned(), "tags".to_owned()],
                }],
                ui_hints: serde_json::json!({}),
                allowed_actions: vec!["refresh".to_owned()],
            }],
            actions: vec![Action {
                id: "refresh".to_owned(),
                label: "Refresh".to_owned(),
                verb: "refresh".to_owned(),
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_kit::context::PluginConfig;
    use catalog_kit::registry::RefresherRegistry;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use tokio_util::sync::CancellationToken;

    #[derive(Default)]
    struct CountingInvalidator {
        discovery: AtomicUsize,
        capabilities: AtomicUsize,
    }

    #[async_trait]
    impl CacheInvalidator for CountingInvalidator {
        fn invalidate_discovery(&self) {
            self.discovery.fetch_add(1, AtomicOrdering::SeqCst);
        }

        async fn invalidate_capabilities(&self, _plugin: &str) {
            self.capabilities.fetch_add(1, AtomicOrdering::SeqCst);
        }
    }

    fn sources_value(path: &std::path::Path) -> serde_json::Value {
        serde_json::json!({
            "sources": [{
                "id": "local",
                "name": "Local",
                "type": "file",
                "enabled": true,
                "properties": { "path": path.to_string_lossy() }
            }]
        })
    }

    #[tokio::test]
    async fn init_loads_entities_and_refresh_reloads_them() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "models:\n  - name: m1\n    provider: acme\n    task: t\n").unwrap();

        let plugin = ModelCatalogPlugin::new();
        let ctx = PluginCtx::new(
            PLUGIN_NAME,
            PluginConfig {
                sources: sources_value(file.path()),
                settings: serde_json::Value::Null,
            },
            CancellationToken::new(),
            Arc::new(RefresherRegistry::new()),
        );
        plugin.init(&ctx).await.unwrap();
        assert_eq!(plugin.sources().total_entity_count(), 1);

        let outcome = plugin.refresh("local").await.unwrap();
        assert_eq!(outcome.entities_loaded, 1);
    }

    #[tokio::test]
    async fn capabilities_v2_is_internally_consistent() {
        let plugin = ModelCatalogPlugin::new();
        assert!(plugin.capabilities_v2().validate().is_ok());
    }

    #[tokio::test]
    async fn apply_and_refresh_invalidate_both_caches() {
        let plugin = ModelCatalogPlugin::new();
        let invalidator = Arc::new(CountingInvalidator::default());
        let ctx = PluginCtx::new(
            PLUGIN_NAME,
            PluginConfig::default(),
            CancellationToken::new(),
            Arc::new(RefresherRegistry::new()),
        )
        .with_invalidator(invalidator.clone());
        plugin.init(&ctx).await.unwrap();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "models:\n  - name: m1\n    provider: acme\n    task: t\n").unwrap();
        plugin
            .apply_source(SourceConfig {
                id: "new-source".to_owned(),
                name: "New".to_owned(),
                source_type: "file".to_owned(),
                enabled: true,
                labels: HashMap::new(),
                properties: serde_json::json!({ "path": file.path().to_string_lossy() }),
                origin: String::new(),
            })
            .await
            .unwrap();
        assert_eq!(invalidator.discovery.load(AtomicOrdering::SeqCst), 1);
        assert_eq!(invalidator.capabilities.load(AtomicOrdering::SeqCst), 1);

        plugin.refresh("new-source").await.unwrap();
        assert_eq!(invalidator.discovery.load(AtomicOrdering::SeqCst), 2);
        assert_eq!(invalidator.capabilities.load(AtomicOrdering::SeqCst), 2);
    }
}
