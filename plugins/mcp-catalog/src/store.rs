//! Loads a source's `servers:` YAML file into `McpServer` entries.

use catalog_kit::source::SourceConfig;
use catalog_kit::yaml;

use crate::model::McpServer;

const ENTITY_PLURAL: &str = "servers";

/// # Errors
/// Returns an error if `properties.path` is missing, or the file can't be
/// read or parsed.
pub fn load_source_entities(source: &SourceConfig) -> anyhow::Result<Vec<McpServer>> {
    let path = source
        .properties
        .get("path")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| anyhow::anyhow!("source '{}' is missing properties.path", source.id))?;
    let resolved = yaml::resolve_relative(path, &source.origin);
    let mut servers: Vec<McpServer> = yaml::load_entries(&resolved, ENTITY_PLURAL)?;
    for server in &mut servers {
        server.source_id = source.id.clone();
    }
    Ok(servers)
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
            "servers:\n  - name: hf-models\n    transportType: stdio\n    endpoint: ./bin/server\n"
        )
        .unwrap();
        let source = SourceConfig {
            id: "hf-models".to_owned(),
            name: "HuggingFace".to_owned(),
            source_type: "file".to_owned(),
            enabled: true,
            labels: HashMap::new(),
            properties: serde_json::json!({ "path": file.path().to_string_lossy() }),
            origin: String::new(),
        };
        let servers = load_source_entities(&source).unwrap();
        assert_eq!(servers.len(), 1);
        assert_eq!(servers[0].source_id, "hf-models");
    }
}
