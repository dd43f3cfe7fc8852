//! The plugin runtime (spec.md §4.8 / C8): registration, failure-isolating
//! init, start, route mounting, capability aggregation and reverse-order
//! stop. Modeled on `modkit::runtime::runner`'s phase model
//! (`db → init → rest → start → wait → stop`, trimmed to the phases this
//! workspace needs since plugins keep their own in-memory stores rather
//! than a shared DB-migrated schema).

use std::collections::HashMap;
use std::sync::Arc;

use axum::Router;
use parking_lot::RwLock;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::capabilities::CapabilitiesV2;
use crate::contracts::{
    AssetMapperProvider, CapabilitiesV2Provider, CatalogPlugin, DiagnosticsProvider,
    PluginRefresher, RestfulPlugin, SourceManager,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginState {
    Registered,
    Initialized,
    Serving,
    Failed,
    Stopped,
}

/// A registered plugin and every optional capability it chose to provide.
/// The runtime probes these the same way `modkit` probes `RestfulModule`/
/// `StatefulModule`/`GrpcServiceModule` independently of the core `Module`
/// trait (spec.md §9: capability provision is opt-in per plugin).
pub struct PluginEntry {
    pub core: Arc<dyn CatalogPlugin>,
    pub restful: Option<Arc<dyn RestfulPlugin>>,
    pub source_manager: Option<Arc<dyn SourceManager>>,
    pub refresher: Option<Arc<dyn PluginRefresher>>,
    pub diagnostics: Option<Arc<dyn DiagnosticsProvider>>,
    pub asset_mapper: Option<Arc<dyn AssetMapperProvider>>,
    pub capabilities_v2: Option<Arc<dyn CapabilitiesV2Provider>>,
    pub base_path: String,
    state: RwLock<PluginState>,
}

impl PluginEntry {
    #[must_use]
    pub fn state(&self) -> PluginState {
        *self.state.read()
    }

    /// Transitions are monotonic within a server lifetime (spec.md §3
    /// invariant: never back to `Registered`).
    fn set_state(&self, new: PluginState) {
        let mut guard = self.state.write();
        debug_assert!(*guard != PluginState::Registered || new != PluginState::Registered);
        *guard = new;
    }
}

/// Builder used by a concrete plugin crate to declare which capabilities it
/// provides, consumed once by `PluginRuntime::register`.
pub struct PluginRegistration {
    pub core: Arc<dyn CatalogPlugin>,
    pub restful: Option<Arc<dyn RestfulPlugin>>,
    pub source_manager: Option<Arc<dyn SourceManager>>,
    pub refresher: Option<Arc<dyn PluginRefresher>>,
    pub diagnostics: Option<Arc<dyn DiagnosticsProvider>>,
    pub asset_mapper: Option<Arc<dyn AssetMapperProvider>>,
    pub capabilities_v2: Option<Arc<dyn CapabilitiesV2Provider>>,
}

impl PluginRegistration {
    #[must_use]
    pub fn new(core: Arc<dyn CatalogPlugin>) -> Self {
        Self {
            core,
            restful: None,
            source_manager: None,
            refresher: None,
            diagnostics: None,
            asset_mapper: None,
            capabilities_v2: None,
        }
    }

    #[must_use]
    pub fn with_restful(mut self, v: Arc<dyn RestfulPlugin>) -> Self {
        self.restful = Some(v);
        self
    }

    #[must_use]
    pub fn with_source_manager(mut self, v: Arc<dyn SourceManager>) -> Self {
        self.source_manager = Some(v);
        self
    }

    #[must_use]
    pub fn with_refresher(mut self, v: Arc<dyn PluginRefresher>) -> Self {
        self.refresher = Some(v);
        self
    }

    #[must_use]
    pub fn with_diagnostics(mut self, v: Arc<dyn DiagnosticsProvider>) -> Self {
        self.diagnostics = Some(v);
        self
    }

    #[must_use]
    pub fn with_asset_mapper(mut self, v: Arc<dyn AssetMapperProvider>) -> Self {
        self.asset_mapper = Some(v);
        self
    }

    #[must_use]
    pub fn with_capabilities_v2(mut self, v: Arc<dyn CapabilitiesV2Provider>) -> Self {
        self.capabilities_v2 = Some(v);
        self
    }
}

#[derive(Debug, Clone)]
pub struct FailedPlugin {
    pub name: String,
    pub base_path: String,
    pub error: String,
}

/// Lookup table from plugin name to its `PluginRefresher`, injected into
/// the job worker pool at construction. This is the mechanism spec.md §9
/// describes for decoupling the job crate from the plugin runtime and
/// avoiding an import cycle — conceptually the same pattern as
/// `modkit::client_hub::ClientHub`, but keyed by a plain plugin name
/// string rather than by interface type.
#[derive(Default)]
pub struct RefresherRegistry {
    inner: RwLock<HashMap<String, Arc<dyn PluginRefresher>>>,
}

impl RefresherRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, plugin: &str, refresher: Arc<dyn PluginRefresher>) {
        self.inner.write().insert(plugin.to_owned(), refresher);
    }

    #[must_use]
    pub fn get(&self, plugin: &str) -> Option<Arc<dyn PluginRefresher>> {
        self.inner.read().get(plugin).cloned()
    }
}

/// Owns the registry of registered plugins and the parallel list of failed
/// plugins with their error (spec.md §3: "the runtime owns a registry of
/// registered plugins and a parallel list of failed plugins").
pub struct PluginRuntime {
    entries: Vec<PluginEntry>,
    failed: RwLock<Vec<FailedPlugin>>,
    refreshers: Arc<RefresherRegistry>,
}

impl Default for PluginRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginRuntime {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            failed: RwLock::new(Vec::new()),
            refreshers: Arc::new(RefresherRegistry::new()),
        }
    }

    #[must_use]
    pub fn refreshers(&self) -> Arc<RefresherRegistry> {
        self.refreshers.clone()
    }

    /// Registers a plugin at build time. Duplicate names are a programming
    /// error (spec.md §3 invariant: at most one plugin per name) and panic,
    /// matching `modkit::module!`'s duplicate-name behavior at wiring time.
    ///
    /// # Panics
    /// Panics if a plugin with the same name is already registered.
    pub fn register(&mut self, reg: PluginRegistration) {
        let name = reg.core.name();
        assert!(
            !self.entries.iter().any(|e| e.core.name() == name),
            "duplicate plugin registration: {name}"
        );
        let base_path = format!("/api/{name}_catalog/{}", reg.core.version());
        self.entries.push(PluginEntry {
            core: reg.core,
            restful: reg.restful,
            source_manager: reg.source_manager,
            refresher: reg.refresher,
            diagnostics: reg.diagnostics,
            asset_mapper: reg.asset_mapper,
            capabilities_v2: reg.capabilities_v2,
            base_path,
            state: RwLock::new(PluginState::Registered),
        });
    }

    /// Calls `init` for every plugin. A plugin that errors is moved to the
    /// failed list; `init` itself never fails due to one plugin (spec.md
    /// §4.8: "one broken plugin must not keep the entire service down").
    pub async fn init_all(&self, ctx_for: impl Fn(&str) -> crate::context::PluginCtx) {
        for entry in &self.entries {
            let ctx = ctx_for(entry.core.name());
            match entry.core.init(&ctx).await {
                Ok(()) => {
                    entry.set_state(PluginState::Initialized);
                    if let Some(refresher) = &entry.refresher {
                        self.refreshers.register(entry.core.name(), refresher.clone());
                    }
                    tracing::info!(plugin = entry.core.name(), "plugin initialized");
                }
                Err(err) => {
                    tracing::error!(plugin = entry.core.name(), error = %err, "plugin init failed");
                    entry.set_state(PluginState::Failed);
                    self.failed.write().push(FailedPlugin {
                        name: entry.core.name().to_owned(),
                        base_path: entry.base_path.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }
    }

    /// Starts only the non-failed plugins.
    pub async fn start_all(&self, cancel: CancellationToken) {
        for entry in self.healthy_entries() {
            match entry.core.start(cancel.clone()).await {
                Ok(()) => entry.set_state(PluginState::Serving),
                Err(err) => {
                    tracing::error!(plugin = entry.core.name(), error = %err, "plugin start failed");
                    entry.set_state(PluginState::Failed);
                    self.failed.write().push(FailedPlugin {
                        name: entry.core.name().to_owned(),
                        base_path: entry.base_path.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }
    }

    /// Mounts every healthy plugin's router under its base path. A plugin
    /// in `Failed` never mounts HTTP routes (spec.md §3 invariant).
    ///
    /// # Errors
    /// Propagates the first route-registration error encountered.
    pub fn mount_routes(&self, mut router: Router) -> anyhow::Result<Router> {
        for entry in self.healthy_entries() {
            if let Some(restful) = &entry.restful {
                let sub = restful.register_routes(Router::new())?;
                router = router.nest(&entry.base_path, sub);
            }
        }
        Ok(router)
    }

    /// Reverse-order shutdown.
    pub async fn stop_all(&self) {
        for entry in self.healthy_entries().into_iter().rev() {
            if let Err(err) = entry.core.stop().await {
                tracing::warn!(plugin = entry.core.name(), error = %err, "plugin stop failed");
            }
            entry.set_state(PluginState::Stopped);
        }
    }

    fn healthy_entries(&self) -> Vec<&PluginEntry> {
        self.entries
            .iter()
            .filter(|e| e.state() != PluginState::Failed)
            .collect()
    }

    #[must_use]
    pub fn entries(&self) -> &[PluginEntry] {
        &self.entries
    }

    #[must_use]
    pub fn failed(&self) -> Vec<FailedPlugin> {
        self.failed.read().clone()
    }

    #[must_use]
    pub fn find(&self, name: &str) -> Option<&PluginEntry> {
        self.entries.iter().find(|e| e.core.name() == name)
    }

    /// `GET /readyz`: healthy iff every plugin is either `Serving` or
    /// explicitly failed-and-acknowledged (i.e. present in the failed list
    /// — we still report it, just not as blocking readiness of the rest of
    /// the service).
    #[must_use]
    pub fn readiness(&self) -> HashMap<String, bool> {
        self.entries
            .iter()
            .map(|e| (e.core.name().to_owned(), e.state() == PluginState::Serving))
            .collect()
    }

    #[must_use]
    pub fn capabilities_v2_for(&self, name: &str) -> Option<CapabilitiesV2> {
        self.find(name).and_then(|e| e.capabilities_v2.as_ref()).map(|p| p.capabilities_v2())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{PluginConfig, PluginCtx};
    use async_trait::async_trait;

    struct Ok1;
    #[async_trait]
    impl CatalogPlugin for Ok1 {
        fn name(&self) -> &'static str {
            "ok1"
        }
        fn version(&self) -> &'static str {
            "v1alpha1"
        }
        fn description(&self) -> &'static str {
            "ok"
        }
        async fn init(&self, _ctx: &PluginCtx) -> anyhow::Result<()> {
            Ok(())
        }
    }

    struct Broken;
    #[async_trait]
    impl CatalogPlugin for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }
        fn version(&self) -> &'static str {
            "v1alpha1"
        }
        fn description(&self) -> &'static str {
            "broken"
        }
        async fn init(&self, _ctx: &PluginCtx) -> anyhow::Result<()> {
            anyhow::bail!("connection refused")
        }
    }

    fn make_ctx(name: &'static str, runtime: &PluginRuntime) -> PluginCtx {
        PluginCtx::new(
            name,
            PluginConfig::default(),
            CancellationToken::new(),
            runtime.refreshers(),
        )
    }

    #[tokio::test]
    async fn failed_plugin_is_isolated_and_never_mounted() {
        let mut rt = PluginRuntime::new();
        rt.register(PluginRegistration::new(Arc::new(Ok1)));
        rt.register(PluginRegistration::new(Arc::new(Broken)));

        rt.init_all(|name| match name {
            "ok1" => make_ctx("ok1", &rt),
            _ => make_ctx("broken", &rt),
        })
        .await;

        assert_eq!(rt.find("ok1").unwrap().state(), PluginState::Initialized);
        assert_eq!(rt.find("broken").unwrap().state(), PluginState::Failed);
        let failed = rt.failed();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].error, "connection refused");

        rt.start_all(CancellationToken::new()).await;
        assert_eq!(rt.find("ok1").unwrap().state(), PluginState::Serving);

        let readiness = rt.readiness();
        assert_eq!(readiness.get("broken"), Some(&false));
        assert_eq!(readiness.get("ok1"), Some(&true));
    }

    #[test]
    #[should_panic(expected = "duplicate plugin registration")]
    fn duplicate_registration_panics() {
        let mut rt = PluginRuntime::new();
        rt.register(PluginRegistration::new(Arc::new(Ok1)));
        rt.register(PluginRegistration::new(Arc::new(Ok1)));
    }
}
