//! Tenant context resolution (spec.md §4.1 / C1): query param, then
//! header, then configured default; validated against DNS-1123 label form.

use axum::extract::Request;
use axum::http::HeaderMap;
use catalog_errors::CatalogError;

pub const DEFAULT_NAMESPACE: &str = "default";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenancyMode {
    Single,
    Namespace,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    pub namespace: String,
}

impl TenantContext {
    #[must_use]
    pub fn default_tenant() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_owned(),
        }
    }
}

/// `namespace` must be a DNS-1123 label: lowercase alphanumeric and `-`,
/// 1–63 characters, not starting or ending with `-`.
#[must_use]
pub fn is_valid_dns_label(namespace: &str) -> bool {
    if namespace.is_empty() || namespace.len() > 63 {
        return false;
    }
    let bytes = namespace.as_bytes();
    let valid_chars = namespace
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    valid_chars && bytes[0] != b'-' && bytes[bytes.len() - 1] != b'-'
}

fn query_namespace(req: &Request) -> Option<String> {
    req.uri().query().and_then(|q| {
        url::form_urlencoded::parse(q.as_bytes())
            .find(|(k, _)| k == "namespace")
            .map(|(_, v)| v.into_owned())
    })
}

fn header_namespace(headers: &HeaderMap) -> Option<String> {
    headers
        .get("X-Namespace")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

/// Resolves the tenant for `req` given the server's tenancy mode.
///
/// In `Single` mode this always returns `"default"`. In `Namespace` mode, a
/// missing or malformed namespace is only an error for state-changing
/// (non-GET) requests — matching spec.md §4.1's "fails with bad-request"
/// rule for state-changing requests specifically.
///
/// # Errors
/// `CatalogError::BadRequest` if namespace mode requires a value and it is
/// missing or not a valid DNS-1123 label on a state-changing request.
pub fn resolve_tenant(
    mode: TenancyMode,
    req: &Request,
    default_namespace: &str,
) -> Result<TenantContext, CatalogError> {
    if mode == TenancyMode::Single {
        return Ok(TenantContext::default_tenant());
    }

    let resolved = query_namespace(req)
        .or_else(|| header_namespace(req.headers()))
        .unwrap_or_else(|| default_namespace.to_owned());

    let is_mutating = req.method() != http::Method::GET;
    if is_mutating && !is_valid_dns_label(&resolved) {
        return Err(CatalogError::bad_request(format!(
            "invalid or missing namespace '{resolved}'"
        )));
    }
    Ok(TenantContext { namespace: resolved })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_dns_1123_labels() {
        assert!(is_valid_dns_label("team-a"));
        assert!(is_valid_dns_label("a"));
        assert!(!is_valid_dns_label(""));
        assert!(!is_valid_dns_label("-leading"));
        assert!(!is_valid_dns_label("trailing-"));
        assert!(!is_valid_dns_label("Has-Upper"));
        assert!(!is_valid_dns_label(&"a".repeat(64)));
    }

    #[test]
    fn single_tenant_mode_always_default() {
        let req = Request::builder().uri("/x?namespace=team-b").body(axum::body::Body::empty()).unwrap();
        let ctx = resolve_tenant(TenancyMode::Single, &req, "default").unwrap();
        assert_eq!(ctx.namespace, "default");
    }

    #[test]
    fn namespace_mode_reads_query_param() {
        let req = Request::builder().uri("/x?namespace=team-b").body(axum::body::Body::empty()).unwrap();
        let ctx = resolve_tenant(TenancyMode::Namespace, &req, "default").unwrap();
        assert_eq!(ctx.namespace, "team-b");
    }

    #[test]
    fn namespace_mode_rejects_malformed_on_mutation() {
        let req = http::Request::builder()
            .method("POST")
            .uri("/x?namespace=Bad_NS")
            .body(axum::body::Body::empty())
            .unwrap();
        assert!(resolve_tenant(TenancyMode::Namespace, &req, "default").is_err());
    }

    #[test]
    fn namespace_mode_allows_malformed_on_get() {
        let req = Request::builder().uri("/x?namespace=Bad_NS").body(axum::body::Body::empty()).unwrap();
        assert!(resolve_tenant(TenancyMode::Namespace, &req, "default").is_ok());
    }
}
