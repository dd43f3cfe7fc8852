//! V2 capabilities document (spec.md §3): a machine-readable description of
//! a plugin's entity kinds, endpoints, fields, filters, UI hints and
//! allowed actions, with referential integrity between `Entity.actions`
//! and the plugin-wide `actions` list.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct FilterField {
    pub field: String,
    pub operators: Vec<String>,
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnHint {
    pub field: String,
    pub label: String,
    pub sortable: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DetailSection {
    pub id: String,
    pub title: String,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Entity {
    pub kind: String,
    pub plural: String,
    pub list_path: String,
    pub get_path: String,
    pub columns: Vec<ColumnHint>,
    pub filter_fields: Vec<FilterField>,
    pub detail_sections: Vec<DetailSection>,
    pub ui_hints: serde_json::Value,
    /// Action IDs from `CapabilitiesV2::actions` allowed against this entity.
    pub allowed_actions: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Action {
    pub id: String,
    pub label: String,
    pub verb: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PluginMeta {
    pub name: String,
    pub version: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CapabilitiesV2 {
    pub schema_version: String,
    pub plugin: PluginMeta,
    pub entities: Vec<Entity>,
    pub actions: Vec<Action>,
}

impl CapabilitiesV2 {
    /// Verifies every `Entity.allowed_actions` ID exists in `actions` — the
    /// referential-integrity invariant from spec.md §3.
    ///
    /// # Errors
    /// Returns the first dangling action ID found.
    pub fn validate(&self) -> Result<(), String> {
        let known: std::collections::HashSet<&str> =
            self.actions.iter().map(|a| a.id.as_str()).collect();
        for entity in &self.entities {
            for action_id in &entity.allowed_actions {
                if !known.contains(action_id.as_str()) {
                    return Err(format!(
                        "entity '{}' references unknown action id '{action_id}'",
                        entity.kind
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(allowed: Vec<&str>) -> CapabilitiesV2 {
        CapabilitiesV2 {
            schema_version: "v2".to_owned(),
            plugin: PluginMeta {
                name: "model".to_owned(),
                version: "v1alpha1".to_owned(),
                description: String::new(),
            },
            entities: vec![Entity {
                kind: "Model".to_owned(),
                plural: "models".to_owned(),
                list_path: "/models".to_owned(),
                get_path: "/models/{name}".to_owned(),
                columns: vec![],
                filter_fields: vec![],
                detail_sections: vec![],
                ui_hints: serde_json::json!({}),
                allowed_actions: allowed.into_iter().map(str::to_owned).collect(),
            }],
            actions: vec![Action {
                id: "refresh".to_owned(),
                label: "Refresh".to_owned(),
                verb: "refresh".to_owned(),
            }],
        }
    }

    #[test]
    fn validates_known_actions() {
        assert!(sample(vec!["refresh"]).validate().is_ok());
    }

    #[test]
    fn rejects_dangling_action_reference() {
        assert!(sample(vec!["delete"]).validate().is_err());
    }
}
