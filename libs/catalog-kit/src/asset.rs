//! The uniform `AssetResource` shape (spec.md §4.9, glossary) that plugins
//! optionally project their native entries into, plus cross-asset link
//! extraction from conventional reference fields.

use serde::Serialize;
use serde_json::Value;

/// A logical reference to another entity, stored by kind+name rather than
/// by pointer — resolution happens at read time via the plugin registry
/// (spec.md §9: "cyclic references … as logical LinkRef, not as pointers").
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LinkRef {
    pub kind: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct AssetStatus {
    pub links: Vec<LinkRef>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssetMetadata {
    pub name: String,
    pub namespace: String,
    pub labels: std::collections::HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssetResource {
    pub api_version: String,
    pub kind: String,
    pub metadata: AssetMetadata,
    pub spec: Value,
    pub status: AssetStatus,
}

/// Reference fields the link extractor recognizes out of the box, per
/// spec.md §4.9 ("`skillRef`, `policyRef`, …").
const CONVENTIONAL_REF_FIELDS: &[(&str, &str)] = &[
    ("skillRef", "Skill"),
    ("policyRef", "Policy"),
    ("guardrailRef", "Guardrail"),
    ("agentRef", "Agent"),
    ("modelRef", "Model"),
    ("promptRef", "Prompt"),
    ("knowledgeRef", "Knowledge"),
    ("mcpServerRef", "McpServer"),
];

/// Extracts `LinkRef`s from any `<x>Ref: name` or `<x>Ref: [name, ...]`
/// field in `spec`. Unknown reference fields are ignored; this is a
/// best-effort projection, not a schema validator.
#[must_use]
pub fn extract_links(spec: &Value) -> Vec<LinkRef> {
    let Some(obj) = spec.as_object() else {
        return Vec::new();
    };
    let mut links = Vec::new();
    for (field, kind) in CONVENTIONAL_REF_FIELDS {
        match obj.get(*field) {
            Some(Value::String(name)) => links.push(LinkRef {
                kind: (*kind).to_owned(),
                name: name.clone(),
            }),
            Some(Value::Array(names)) => {
                for name in names {
                    if let Some(name) = name.as_str() {
                        links.push(LinkRef {
                            kind: (*kind).to_owned(),
                            name: name.to_owned(),
                        });
                    }
                }
            }
            _ => {}
        }
    }
    links
}

/// Builds an `AssetResource` from a generic, already-serialized entry.
///
/// # Errors
/// Returns an error for a `Value::Null` entry (the "nil pointer entries
/// produce an error" rule from spec.md §4.9). Map-shaped entries are mapped
/// best-effort; unknown entity types are the caller's responsibility to
/// reject before calling this.
pub fn map_to_asset(
    api_version: &str,
    kind: &str,
    namespace: &str,
    name: &str,
    labels: std::collections::HashMap<String, String>,
    spec: Value,
) -> anyhow::Result<AssetResource> {
    if spec.is_null() {
        anyhow::bail!("cannot map a null entry to an asset");
    }
    let links = extract_links(&spec);
    Ok(AssetResource {
        api_version: api_version.to_owned(),
        kind: kind.to_owned(),
        metadata: AssetMetadata {
            name: name.to_owned(),
            namespace: namespace.to_owned(),
            labels,
        },
        spec,
        status: AssetStatus {
            links,
            extra: serde_json::Map::new(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_scalar_and_array_refs() {
        let spec = serde_json::json!({
            "skillRef": "summarize",
            "policyRef": ["pii-block", "rate-limit"],
            "unrelated": "ignored",
        });
        let links = extract_links(&spec);
        assert!(links.contains(&LinkRef { kind: "Skill".into(), name: "summarize".into() }));
        assert_eq!(links.iter().filter(|l| l.kind == "Policy").count(), 2);
    }

    #[test]
    fn rejects_null_entry() {
        assert!(map_to_asset("v1", "Agent", "default", "a", Default::default(), Value::Null).is_err());
    }
}
