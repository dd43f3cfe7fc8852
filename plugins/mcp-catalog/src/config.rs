//! `plugins.mcp.settings`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct McpCatalogSettings {
    /// When `true`, `management/refresh` enqueues a job instead of running
    /// synchronously, provided a job store was wired in at construction.
    #[serde(default = "default_true")]
    pub async_refresh: bool,
}

fn default_true() -> bool {
    true
}
