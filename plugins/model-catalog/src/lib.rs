//! Catalog plugin hosting model artifacts (spec.md worked example "A").

mod config;
mod handlers;
mod model;
mod plugin;
mod store;

pub use model::Model;
pub use plugin::ModelCatalogPlugin;

use std::sync::Arc;

use catalog_kit::registry::PluginRegistration;

/// Builds the registration the server hands to `PluginRuntime::register`.
#[must_use]
pub fn build_registration() -> PluginRegistration {
    let plugin = Arc::new(ModelCatalogPlugin::new());
    PluginRegistration::new(plugin.clone())
        .with_restful(plugin.clone())
        .with_source_manager(plugin.clone())
        .with_refresher(plugin.clone())
        .with_diagnostics(plugin.clone())
        .with_capabilities_v2(plugin)
}
