//! Loads a source's `models:` YAML file and keeps the plugin's in-memory
//! `SourceCollection` in sync with it.

use catalog_kit::source::SourceConfig;
use catalog_kit::yaml;

use crate::model::Model;

const ENTITY_PLURAL: &str = "models";

/// Reads `source.properties.path` (resolved relative to the source's
/// origin document) and tags every parsed `Model` with the source id.
///
/// # Errors
/// Returns an error if `properties.path` is missing, or the file can't be
/// read or parsed.
pub fn load_source_entities(source: &SourceConfig) -> anyhow::Result<Vec<Model>> {
    let path = source
        .properties
        .get("path")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| anyhow::anyhow!("source '{}' is missing properties.path", source.id))?;
    let resolved = yaml::resolve_relative(path, &source.origin);
    let mut models: Vec<Model> = yaml::load_entries(&resolved, ENTITY_PLURAL)?;
    for model in &mut models {
        model.source_id = source.id.clone();
    }
    Ok(models)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn loads_and_tags_entities_with_source_id() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "models:\n  - name: gpt-oss\n    provider: acme\n    task: text-generation\n"
        )
        .unwrap();
        let source = SourceConfig {
            id: "src-1".to_owned(),
            name: "Local".to_owned(),
            source_type: "file".to_owned(),
            enabled: true,
            labels: HashMap::new(),
            properties: serde_json::json!({ "path": file.path().to_string_lossy() }),
            origin: String::new(),
        };
        let models = load_source_entities(&source).unwrap();
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].source_id, "src-1");
    }

    #[test]
    fn rejects_source_without_path() {
        let source = SourceConfig {
            id: "src-1".to_owned(),
            name: "Local".to_owned(),
            source_type: "file".to_owned(),
            enabled: true,
            labels: HashMap::new(),
            properties: serde_json::json!({}),
            origin: String::new(),
        };
        assert!(load_source_entities(&source).is_err());
    }
}
