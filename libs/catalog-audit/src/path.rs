//! Path-to-audit extraction rules (spec.md §6, normative): derive plugin
//! name, resource type, resource IDs and action verb from a request path.

use http::Method;

const RESOURCE_SEGMENTS: &[&str] = &[
    "sources",
    "entities",
    "actions",
    "refresh",
    "diagnostics",
    "apply-source",
    "validate-source",
    "approvals",
    "assets",
    "revisions",
];

const VERB_SUFFIXES: &[&str] = &[":action", ":validate", ":rollback"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedAudit {
    pub plugin: Option<String>,
    pub resource_type: Option<String>,
    pub resource_ids: Vec<String>,
    pub action_verb: Option<String>,
}

/// Plugin is the segment before `_catalog` in `/api/{plugin}_catalog/...`,
/// or the bare name segment for governance/audit paths `/api/{name}/...`.
fn extract_plugin(segments: &[&str]) -> Option<String> {
    if segments.first() != Some(&"api") {
        return None;
    }
    let name = segments.get(1)?;
    if let Some(plugin) = name.strip_suffix("_catalog") {
        return Some(plugin.to_owned());
    }
    if matches!(*name, "governance" | "audit") {
        return segments.get(2).map(|s| (*s).to_owned());
    }
    Some((*name).to_owned())
}

fn strip_verb_suffix(segment: &str) -> (&str, Option<&'static str>) {
    for suffix in VERB_SUFFIXES {
        if let Some(stripped) = segment.strip_suffix(suffix) {
            return (stripped, Some(&suffix[1..]));
        }
    }
    (segment, None)
}

/// Extracts plugin, resource type, resource IDs and action verb from
/// `path` per the normative rules in spec.md §6.
#[must_use]
pub fn extract(method: &Method, path: &str) -> ExtractedAudit {
    let raw_segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let plugin = extract_plugin(&raw_segments);

    let mut resource_type = None;
    let mut resource_ids = Vec::new();
    let mut action_verb = None;

    for (idx, raw) in raw_segments.iter().enumerate() {
        let (segment, verb) = strip_verb_suffix(raw);
        if verb.is_some() {
            action_verb = verb.map(str::to_owned);
        }
        if resource_type.is_none() && RESOURCE_SEGMENTS.contains(&segment) {
            resource_type = Some(segment.to_owned());
            if let Some(next) = raw_segments.get(idx + 1) {
                let (id, verb) = strip_verb_suffix(next);
                if !RESOURCE_SEGMENTS.contains(&id) {
                    resource_ids.push(id.to_owned());
                }
                if verb.is_some() {
                    action_verb = verb.map(str::to_owned);
                }
            }
        }
    }

    if action_verb.is_none() {
        action_verb = match *method {
            Method::GET => Some("list".to_owned()),
            Method::POST => Some("create".to_owned()),
            Method::PUT | Method::PATCH => Some("update".to_owned()),
            Method::DELETE => Some("delete".to_owned()),
            _ => None,
        };
    }

    ExtractedAudit {
        plugin,
        resource_type,
        resource_ids,
        action_verb,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_plugin_from_catalog_suffix() {
        let e = extract(&Method::GET, "/api/model_catalog/v1alpha1/models");
        assert_eq!(e.plugin.as_deref(), Some("model"));
    }

    #[test]
    fn extracts_plugin_for_governance_and_audit() {
        let e = extract(&Method::GET, "/api/governance/mcp_catalog/approvals");
        assert_eq!(e.plugin.as_deref(), Some("mcp_catalog"));
    }

    #[test]
    fn extracts_resource_id_and_strips_verb_suffix() {
        let e = extract(&Method::POST, "/api/model_catalog/v1alpha1/management/sources/abc:validate");
        assert_eq!(e.resource_type.as_deref(), Some("sources"));
        assert_eq!(e.resource_ids, vec!["abc".to_owned()]);
        assert_eq!(e.action_verb.as_deref(), Some("validate"));
    }

    #[test]
    fn falls_back_to_http_method_for_action_verb() {
        let e = extract(&Method::GET, "/api/model_catalog/v1alpha1/management/diagnostics");
        assert_eq!(e.action_verb.as_deref(), Some("list"));
    }
}
