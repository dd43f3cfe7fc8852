//! Authorization (spec.md §4.3 / C3): HTTP request → (resource, verb)
//! mapping, and the two authorizer backends (`Noop`, SAR against
//! Kubernetes RBAC).

use async_trait::async_trait;
use catalog_errors::CatalogError;
use http::Method;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthzRequest {
    pub resource: String,
    pub verb: String,
    pub namespace: Option<String>,
}

/// Maps an HTTP method and path to a `(resource, verb)` authorization
/// pair, evaluated most-specific-first per spec.md §4.3. Returns `None` for
/// unmapped paths, which callers must treat as deny-by-default.
#[must_use]
pub fn map_request(method: &Method, path: &str, namespace: Option<&str>) -> Option<AuthzRequest> {
    let req = |resource: &str, verb: &str| {
        Some(AuthzRequest {
            resource: resource.to_owned(),
            verb: verb.to_owned(),
            namespace: namespace.map(str::to_owned),
        })
    };

    if method == Method::GET && path == "/api/plugins" {
        return req("plugins", "list");
    }
    if method == Method::GET && path.ends_with("/capabilities") && path.starts_with("/api/plugins/") {
        return req("capabilities", "get");
    }
    if path.ends_with(":action") {
        return req("actions", "execute");
    }
    if path.ends_with(":validate") || path.ends_with(":rollback") {
        return req("catalogsources", "update");
    }
    if path.contains("/management/sources") {
        return if path.ends_with("/apply-source") {
            req("catalogsources", "create")
        } else if path.ends_with("/validate-source") {
            req("catalogsources", "update")
        } else if path.ends_with("/enable") {
            req("catalogsources", "update")
        } else {
            let verb = match *method {
                Method::GET => "list",
                Method::POST => "create",
                Method::PUT | Method::PATCH => "update",
                Method::DELETE => "delete",
                _ => return None,
            };
            req("catalogsources", verb)
        };
    }
    if path.contains("/management/refresh") {
        return req("jobs", "create");
    }
    if path.contains("/management/actions") {
        let verb = if method == Method::GET { "list" } else { "execute" };
        return req("actions", verb);
    }
    if path.contains("/management/entities") || path.contains("/entities") {
        let verb = match *method {
            Method::GET => "list",
            Method::POST => "create",
            Method::PUT | Method::PATCH => "update",
            Method::DELETE => "delete",
            _ => return None,
        };
        return req("assets", verb);
    }
    // A plugin's bare `{basePath}/{plural}[/{name}]` collection (spec.md §6's
    // bit-exact HTTP surface) is also an asset endpoint even without an
    // `/entities` path segment.
    if path.starts_with("/api/") && path.contains("_catalog/") && !path.contains("/management/") {
        let verb = match *method {
            Method::GET => "list",
            Method::POST => "create",
            Method::PUT | Method::PATCH => "update",
            Method::DELETE => "delete",
            _ => return None,
        };
        return req("assets", verb);
    }
    if path.starts_with("/api/governance/") {
        let verb = if path.ends_with("/approve") {
            "approve"
        } else if method == Method::GET {
            "list"
        } else {
            "get"
        };
        return req("approvals", verb);
    }
    if path.starts_with("/api/audit/") {
        let verb = if method == Method::GET { "list" } else { "get" };
        return req("audit", verb);
    }
    if path.starts_with("/api/jobs/") {
        let verb = if method == Method::GET { "list" } else { "execute" };
        return req("jobs", verb);
    }
    None
}

/// Contract: `authorize(user, groups, resource, verb, namespace)`.
///
/// Implementations must never fabricate an allow on internal error —
/// callers translate `Err` to `500` and `Ok(false)` to `403`.
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn authorize(
        &self,
        user: &str,
        groups: &[String],
        req: &AuthzRequest,
    ) -> Result<bool, CatalogError>;
}

/// Always allows. Used in development and for deployments without an
/// underlying RBAC source of truth.
#[derive(Debug, Clone, Default)]
pub struct NoopAuthorizer;

#[async_trait]
impl Authorizer for NoopAuthorizer {
    async fn authorize(
        &self,
        _user: &str,
        _groups: &[String],
        _req: &AuthzRequest,
    ) -> Result<bool, CatalogError> {
        Ok(true)
    }
}

/// The API group carried on every `SubjectAccessReview` this service
/// creates, per spec.md §4.3.
pub const SAR_API_GROUP: &str = "catalog.kubeflow.org";

#[cfg(feature = "sar")]
pub use sar::SarAuthorizer;

#[cfg(feature = "sar")]
mod sar {
    use super::{AuthzRequest, Authorizer, SAR_API_GROUP};
    use async_trait::async_trait;
    use catalog_errors::CatalogError;
    use k8s_openapi::api::authorization::v1::{
        ResourceAttributes, SubjectAccessReview, SubjectAccessReviewSpec,
    };
    use kube::api::{Api, PostParams};
    use kube::Client;

    /// Authorizes by creating a `SubjectAccessReview` against the cluster's
    /// RBAC and reading back its `status.allowed` field.
    pub struct SarAuthorizer {
        client: Client,
    }

    impl SarAuthorizer {
        #[must_use]
        pub fn new(client: Client) -> Self {
            Self { client }
        }
    }

    #[async_trait]
    impl Authorizer for SarAuthorizer {
        async fn authorize(
            &self,
            user: &str,
            groups: &[String],
            req: &AuthzRequest,
        ) -> Result<bool, CatalogError> {
            let review = SubjectAccessReview {
                spec: SubjectAccessReviewSpec {
                    user: Some(user.to_owned()),
                    groups: Some(groups.to_vec()),
                    resource_attributes: Some(ResourceAttributes {
                        group: Some(SAR_API_GROUP.to_owned()),
                        resource: Some(req.resource.clone()),
                        verb: Some(req.verb.clone()),
                        namespace: req.namespace.clone(),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
                ..Default::default()
            };

            let api: Api<SubjectAccessReview> = Api::all(self.client.clone());
            let created = api
                .create(&PostParams::default(), &review)
                .await
                .map_err(|err| CatalogError::internal(format!("SubjectAccessReview failed: {err}")))?;

            Ok(created.status.is_some_and(|s| s.allowed))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_plugin_list_and_capabilities() {
        let r = map_request(&Method::GET, "/api/plugins", None).unwrap();
        assert_eq!((r.resource.as_str(), r.verb.as_str()), ("plugins", "list"));

        let r = map_request(&Method::GET, "/api/plugins/model-catalog/capabilities", None).unwrap();
        assert_eq!((r.resource.as_str(), r.verb.as_str()), ("capabilities", "get"));
    }

    #[test]
    fn maps_action_and_source_suffixes_before_generic_rules() {
        let r = map_request(&Method::POST, "/api/x/models/foo:action", None).unwrap();
        assert_eq!((r.resource.as_str(), r.verb.as_str()), ("actions", "execute"));

        let r = map_request(&Method::POST, "/api/x/models/foo:validate", None).unwrap();
        assert_eq!((r.resource.as_str(), r.verb.as_str()), ("catalogsources", "update"));
    }

    #[test]
    fn maps_management_sources_crud_and_named_actions() {
        let r = map_request(&Method::GET, "/api/x/management/sources", None).unwrap();
        assert_eq!(r.verb, "list");
        let r = map_request(&Method::POST, "/api/x/management/sources/apply-source", None).unwrap();
        assert_eq!(r.verb, "create");
        let r = map_request(&Method::POST, "/api/x/management/sources/foo/enable", None).unwrap();
        assert_eq!(r.verb, "update");
    }

    #[test]
    fn unmapped_path_denies_by_default() {
        assert!(map_request(&Method::GET, "/totally/unknown", None).is_none());
    }

    #[test]
    fn maps_bare_plugin_collection_as_assets() {
        let r = map_request(&Method::GET, "/api/model_catalog/v1alpha1/models", None).unwrap();
        assert_eq!((r.resource.as_str(), r.verb.as_str()), ("assets", "list"));

        let r = map_request(&Method::GET, "/api/model_catalog/v1alpha1/models/gpt", None).unwrap();
        assert_eq!((r.resource.as_str(), r.verb.as_str()), ("assets", "list"));
    }

    #[tokio::test]
    async fn noop_always_allows() {
        let authz = NoopAuthorizer;
        let req = AuthzRequest {
            resource: "plugins".into(),
            verb: "list".into(),
            namespace: None,
        };
        assert!(authz.authorize("alice", &[], &req).await.unwrap());
    }
}
