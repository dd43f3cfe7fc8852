//! Plugin contracts. Capability provision is opt-in per plugin: a plugin
//! implements only the small traits it needs (`SourceManager`,
//! `RefreshProvider`, `DiagnosticsProvider`, `AssetMapperProvider`,
//! `CapabilitiesV2Provider`) and the runtime probes for each at discovery
//! time, matching spec.md §9's "variant sets vs inheritance" note and
//! `modkit::contracts`'s split of `Module`/`RestfulModule`/`StatefulModule`.

use async_trait::async_trait;
use axum::Router;

use crate::capabilities::CapabilitiesV2;
use crate::context::PluginCtx;

/// Every plugin implements this. `init` performs DI/wiring; a plugin that
/// returns an error here is moved to the runtime's failed list and never
/// mounts routes (failure isolation, spec.md §4.8).
#[async_trait]
pub trait CatalogPlugin: Send + Sync + 'static {
    fn name(&self) -> &'static str;
    fn version(&self) -> &'static str;
    fn description(&self) -> &'static str;

    async fn init(&self, ctx: &PluginCtx) -> anyhow::Result<()>;

    /// Called after all plugins have attempted `init`. Long-running work
    /// must be spawned under `ctx.cancel` rather than block here.
    async fn start(&self, _cancel: tokio_util::sync::CancellationToken) -> anyhow::Result<()> {
        Ok(())
    }

    /// Reverse-order shutdown hook: cancel background work, release
    /// git-provider handles, mark unhealthy.
    async fn stop(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Entity kinds this plugin hosts, used for `GET /api/plugins` discovery.
    fn entity_kinds(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Mounts the plugin's HTTP routes. Pure wiring — no blocking I/O.
pub trait RestfulPlugin: Send + Sync {
    fn register_routes(&self, router: Router) -> anyhow::Result<Router>;
}

/// Plugins that manage named, typed sources (YAML file, git repo, …).
#[async_trait]
pub trait SourceManager: Send + Sync {
    async fn list_sources(&self) -> Vec<crate::source::Source>;
    async fn validate_source(&self, source: &crate::source::SourceConfig) -> Result<(), Vec<String>>;
    async fn apply_source(&self, source: crate::source::SourceConfig) -> anyhow::Result<()>;
    async fn enable_source(&self, id: &str, enabled: bool) -> anyhow::Result<()>;
    async fn delete_source(&self, id: &str) -> anyhow::Result<()>;
}

/// Result of a single refresh operation, returned synchronously or via a
/// completed `RefreshJob`.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct RefreshOutcome {
    pub entities_loaded: u64,
    pub entities_removed: u64,
    pub duration_ms: u64,
    pub message: String,
}

/// The refresh contract the job worker pool (C7) calls into by plugin name,
/// decoupling the job crate from the plugin runtime (spec.md §9).
#[async_trait]
pub trait PluginRefresher: Send + Sync {
    async fn refresh(&self, source_id: &str) -> anyhow::Result<RefreshOutcome>;
    async fn refresh_all(&self) -> anyhow::Result<RefreshOutcome>;
}

/// Same contract exposed as a plugin capability for the synchronous path
/// (`POST .../management/refresh` when no job store is configured).
#[async_trait]
pub trait RefreshProvider: PluginRefresher {}

#[async_trait]
impl<T: PluginRefresher + ?Sized> RefreshProvider for T {}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SourceDiagnostics {
    pub id: String,
    pub name: String,
    pub state: String,
    pub entity_count: u64,
    pub last_refresh_time: Option<String>,
    pub last_refresh_duration_ms: Option<u64>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct Diagnostics {
    pub plugin_name: String,
    pub sources: Vec<SourceDiagnostics>,
    pub last_refresh: Option<String>,
    pub errors: Vec<String>,
}

#[async_trait]
pub trait DiagnosticsProvider: Send + Sync {
    async fn diagnostics(&self) -> Diagnostics;
}

/// Plugins that can project their native entries into the uniform asset
/// shape (`AssetResource`) expose this.
pub trait AssetMapperProvider: Send + Sync {
    fn map_asset(&self, kind: &str, name: &str) -> anyhow::Result<crate::asset::AssetResource>;
}

/// Plugins that publish a machine-readable V2 capabilities document.
pub trait CapabilitiesV2Provider: Send + Sync {
    fn capabilities_v2(&self) -> CapabilitiesV2;
}
