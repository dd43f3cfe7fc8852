//! The `Model` entity this plugin hosts: one row per model artifact
//! declared in a source's `models:` YAML list.

use std::collections::HashMap;

use catalog_filter::Filterable;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    pub name: String,
    pub provider: String,
    pub task: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub properties: serde_json::Value,
    /// Injected at load time, not read from the source YAML itself.
    #[serde(default)]
    pub source_id: String,
}

impl Filterable for Model {
    fn field_value(&self, field: &str) -> String {
        match field {
            "name" => self.name.clone(),
            "provider" => self.provider.clone(),
            "task" => self.task.clone(),
            "sourceId" => self.source_id.clone(),
            "tags" => self.tags.join(","),
            _ => self
                .labels
                .get(field)
                .cloned()
                .unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Model {
        Model {
            name: "gpt-oss".to_owned(),
            provider: "acme".to_owned(),
            task: "text-generation".to_owned(),
            tags: vec!["llm".to_owned(), "chat".to_owned()],
            labels: HashMap::from([("tier".to_owned(), "gold".to_owned())]),
            properties: serde_json::json!({}),
            source_id: "src-1".to_owned(),
        }
    }

    #[test]
    fn resolves_known_fields() {
        let m = sample();
        assert_eq!(m.field_value("provider"), "acme");
        assert_eq!(m.field_value("tags"), "llm,chat");
    }

    #[test]
    fn resolves_labels_as_fallback_and_unknown_as_empty() {
        let m = sample();
        assert_eq!(m.field_value("tier"), "gold");
        assert_eq!(m.field_value("bogus"), "");
    }
}
