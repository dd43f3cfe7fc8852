//! Caller identity extraction (spec.md §4.2 / C2): trusted proxy headers,
//! never re-authenticated by this service.

use axum::http::HeaderMap;

pub const ANONYMOUS_USER: &str = "anonymous";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user: String,
    pub groups: Vec<String>,
}

impl Default for Identity {
    fn default() -> Self {
        Self {
            user: ANONYMOUS_USER.to_owned(),
            groups: Vec::new(),
        }
    }
}

/// Extracts the caller identity from `X-Remote-User` and comma-separated
/// `X-Remote-Group`. Missing user defaults to `"anonymous"`; groups are
/// trimmed and empty segments are dropped.
#[must_use]
pub fn extract_identity(headers: &HeaderMap) -> Identity {
    let user = headers
        .get("X-Remote-User")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(ANONYMOUS_USER)
        .to_owned();

    let groups = headers
        .get("X-Remote-Group")
        .and_then(|v| v.to_str().ok())
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default();

    Identity { user, groups }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn defaults_to_anonymous_with_no_headers() {
        let identity = extract_identity(&HeaderMap::new());
        assert_eq!(identity.user, "anonymous");
        assert!(identity.groups.is_empty());
    }

    #[test]
    fn extracts_user_and_trims_groups() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Remote-User", HeaderValue::from_static("alice"));
        headers.insert("X-Remote-Group", HeaderValue::from_static(" admins , , readers "));
        let identity = extract_identity(&headers);
        assert_eq!(identity.user, "alice");
        assert_eq!(identity.groups, vec!["admins", "readers"]);
    }

    #[test]
    fn blank_user_header_falls_back_to_anonymous() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Remote-User", HeaderValue::from_static("   "));
        assert_eq!(extract_identity(&headers).user, "anonymous");
    }
}
