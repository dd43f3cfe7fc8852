//! The `McpServer` entity this plugin hosts: one row per MCP server
//! declared in a source's `servers:` YAML list.

use std::collections::HashMap;

use catalog_filter::Filterable;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServer {
    pub name: String,
    #[serde(rename = "transportType")]
    pub transport_type: String,
    pub endpoint: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub properties: serde_json::Value,
    #[serde(default, rename = "sourceId")]
    pub source_id: String,
}

impl Filterable for McpServer {
    fn field_value(&self, field: &str) -> String {
        match field {
            "name" => self.name.clone(),
            "transportType" => self.transport_type.clone(),
            "endpoint" => self.endpoint.clone(),
            "sourceId" => self.source_id.clone(),
            _ => self.labels.get(field).cloned().unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_and_unknown_fields() {
        let s = McpServer {
            name: "hf-models".to_owned(),
            transport_type: "stdio".to_owned(),
            endpoint: "./bin/server".to_owned(),
            labels: HashMap::new(),
            properties: serde_json::json!({}),
            source_id: "src".to_owned(),
        };
        assert_eq!(s.field_value("transportType"), "stdio");
        assert_eq!(s.field_value("bogus"), "");
    }
}
