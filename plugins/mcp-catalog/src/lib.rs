//! Catalog plugin hosting MCP servers (spec.md worked example "C").

mod config;
mod handlers;
mod model;
mod plugin;
mod store;

pub use model::McpServer;
pub use plugin::McpCatalogPlugin;

use std::sync::Arc;

use catalog_jobs::JobStore;
use catalog_kit::registry::PluginRegistration;

/// Builds the registration the server hands to `PluginRuntime::register`.
/// `job_store` is `None` in deployments without a database, in which case
/// `management/refresh` always runs synchronously.
#[must_use]
pub fn build_registration(job_store: Option<Arc<dyn JobStore>>) -> PluginRegistration {
    let plugin = Arc::new(McpCatalogPlugin::new(job_store));
    PluginRegistration::new(plugin.clone())
        .with_restful(plugin.clone())
        .with_source_manager(plugin.clone())
        .with_refresher(plugin.clone())
        .with_diagnostics(plugin.clone())
        .with_capabilities_v2(plugin)
}
