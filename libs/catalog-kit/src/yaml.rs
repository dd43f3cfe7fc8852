//! Ingestion of the unified `CatalogSources` YAML document (spec.md §6) and
//! of per-source entity YAML shaped `{kind-plural: [entries]}`.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::source::SourceConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogEntry {
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

/// Top-level `apiVersion: catalog/v1alpha1, kind: CatalogSources` document.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogSourcesDocument {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub catalogs: HashMap<String, CatalogEntry>,
}

/// Parses the unified sources document and injects `origin` (the document's
/// own path) into each `SourceConfig` that doesn't declare one.
///
/// # Errors
/// Returns an error if the file can't be read or isn't valid YAML, or if
/// `kind` isn't `CatalogSources`.
pub fn load_catalog_sources(path: &Path) -> anyhow::Result<CatalogSourcesDocument> {
    let raw = std::fs::read_to_string(path)?;
    let mut doc: CatalogSourcesDocument = serde_yaml::from_str(&raw)?;
    if doc.kind != "CatalogSources" {
        anyhow::bail!("expected kind CatalogSources, got '{}'", doc.kind);
    }
    let origin = path.to_string_lossy().to_string();
    for entry in doc.catalogs.values_mut() {
        for source in &mut entry.sources {
            if source.origin.is_empty() {
                source.origin = origin.clone();
            }
        }
    }
    Ok(doc)
}

/// Resolves `raw_path` relative to `origin` (a file path) unless it is
/// already absolute.
#[must_use]
pub fn resolve_relative(raw_path: &str, origin: &str) -> std::path::PathBuf {
    let p = Path::new(raw_path);
    if p.is_absolute() {
        return p.to_path_buf();
    }
    Path::new(origin)
        .parent()
        .map_or_else(|| p.to_path_buf(), |dir| dir.join(p))
}

/// Parses a document shaped `{kind-plural: [entries]}` into typed entries.
///
/// # Errors
/// Returns an error if the file can't be read, isn't valid YAML, or the
/// `plural` key is missing.
pub fn load_entries<T: serde::de::DeserializeOwned>(
    path: &Path,
    plural: &str,
) -> anyhow::Result<Vec<T>> {
    let raw = std::fs::read_to_string(path)?;
    let doc: serde_yaml::Value = serde_yaml::from_str(&raw)?;
    let Some(list) = doc.get(plural) else {
        anyhow::bail!("missing '{plural}' key in {}", path.display());
    };
    Ok(serde_yaml::from_value(list.clone())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_catalog_sources_document() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
apiVersion: catalog/v1alpha1
kind: CatalogSources
catalogs:
  model:
    sources:
      - id: hf-models
        name: HuggingFace
        type: file
        properties:
          path: models.yaml
"#
        )
        .unwrap();
        let doc = load_catalog_sources(file.path()).unwrap();
        let model = &doc.catalogs["model"];
        assert_eq!(model.sources.len(), 1);
        assert_eq!(model.sources[0].id, "hf-models");
        assert!(!model.sources[0].origin.is_empty());
    }

    #[test]
    fn rejects_wrong_kind() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "apiVersion: catalog/v1alpha1\nkind: Other\ncatalogs: {{}}").unwrap();
        assert!(load_catalog_sources(file.path()).is_err());
    }

    #[test]
    fn resolves_relative_paths_against_origin() {
        let resolved = resolve_relative("models.yaml", "/etc/catalog/sources.yaml");
        assert_eq!(resolved, Path::new("/etc/catalog/models.yaml"));
    }
}
