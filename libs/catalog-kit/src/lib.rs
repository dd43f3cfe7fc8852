//! Plugin runtime and plugin-kit services shared by every catalog plugin:
//! lifecycle/registration (C8) and source store/pagination/filter/YAML/git
//! ingestion (C9) from spec.md §4.8–4.9.

pub mod asset;
pub mod capabilities;
pub mod context;
pub mod contracts;
pub mod git;
pub mod invalidation;
pub mod registry;
pub mod source;
pub mod yaml;

pub use context::{PluginConfig, PluginCtx};
pub use contracts::{
    AssetMapperProvider, CapabilitiesV2Provider, CatalogPlugin, Diagnostics, DiagnosticsProvider,
    PluginRefresher, RefreshOutcome, RestfulPlugin, SourceDiagnostics, SourceManager,
};
pub use invalidation::{CacheInvalidator, NoopCacheInvalidator};
pub use registry::{PluginEntry, PluginRegistration, PluginRuntime, PluginState, RefresherRegistry};
pub use source::{Source, SourceCollection, SourceConfig};

/// Re-exported so plugins don't need a direct dependency on `catalog-filter`
/// just to satisfy trait bounds passed through `catalog-kit` APIs.
pub use catalog_filter as filter;
