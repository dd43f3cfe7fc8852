//! Layered configuration (spec.md §4.10 / SPEC_FULL §1): defaults → YAML
//! file → `APP__*` env vars, modeled on
//! `modkit_bootstrap::config::AppConfig`'s merge order.

use std::collections::HashMap;
use std::path::Path;

use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_owned(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenancyConfig {
    /// `"single"` or `"namespace"` (spec.md §4.1).
    pub mode: String,
    pub default_namespace: String,
}

impl Default for TenancyConfig {
    fn default() -> Self {
        Self {
            mode: "single".to_owned(),
            default_namespace: "default".to_owned(),
        }
    }
}

impl TenancyConfig {
    pub fn mode(&self) -> catalog_authz::TenancyMode {
        match self.mode.as_str() {
            "namespace" => catalog_authz::TenancyMode::Namespace,
            _ => catalog_authz::TenancyMode::Single,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite::memory:".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthzConfig {
    /// `"noop"` or `"sar"` (spec.md §4.3).
    pub mode: String,
    pub cache_ttl_seconds: u64,
}

impl Default for AuthzConfig {
    fn default() -> Self {
        Self {
            mode: "noop".to_owned(),
            cache_ttl_seconds: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    pub enabled: bool,
    pub log_denied: bool,
    pub retention_days: i64,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_denied: true,
            retention_days: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub discovery_ttl_seconds: u64,
    pub capabilities_ttl_seconds: u64,
    pub max_entries: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            discovery_ttl_seconds: 10,
            capabilities_ttl_seconds: 30,
            max_entries: 1_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    pub concurrency: usize,
    pub max_retries: i32,
    pub poll_interval_seconds: u64,
    pub claim_timeout_seconds: u64,
    pub retention_days: i64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            max_retries: 3,
            poll_interval_seconds: 2,
            claim_timeout_seconds: 600,
            retention_days: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderElectionConfig {
    pub enabled: bool,
    pub lease_name: String,
    pub lease_namespace: String,
    pub lease_duration_seconds: u64,
}

impl Default for LeaderElectionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            lease_name: "catalog-server-leader".to_owned(),
            lease_namespace: "default".to_owned(),
            lease_duration_seconds: 15,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub tenancy: TenancyConfig,
    pub database: DatabaseConfig,
    /// Path to the unified `CatalogSources` YAML document (spec.md §6).
    pub sources_file: Option<String>,
    pub authz: AuthzConfig,
    pub audit: AuditConfig,
    pub cache: CacheConfig,
    pub jobs: JobsConfig,
    pub leader_election: LeaderElectionConfig,
    /// Per-plugin `settings` sections, keyed by plugin name (e.g.
    /// `plugins.mcp.asyncRefresh`).
    #[serde(default)]
    pub plugins: HashMap<String, serde_json::Value>,
}

impl AppConfig {
    /// Loads defaults, then an optional YAML file, then `APP__*` env vars.
    ///
    /// # Errors
    /// Returns an error if the YAML file is present but malformed, or if the
    /// merged configuration doesn't deserialize into `AppConfig`.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(AppConfig::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        figment = figment.merge(Env::prefixed("APP__").split("__"));
        Ok(figment.extract()?)
    }

    /// # Errors
    /// Returns an error if the config fails to serialize to YAML.
    pub fn to_yaml(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_load_without_a_file() {
        let config = AppConfig::load(None).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.tenancy.mode, "single");
    }

    #[test]
    fn yaml_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"server:\n  port: 9090\n").unwrap();
        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "0.0.0.0");
    }

    #[test]
    fn round_trips_through_yaml() {
        let config = AppConfig::default();
        let yaml = config.to_yaml().unwrap();
        assert!(yaml.contains("port: 8080"));
    }
}
