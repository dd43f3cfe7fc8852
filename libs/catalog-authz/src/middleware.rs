//! Axum middleware wiring tenant resolution, identity extraction and
//! authorization into the fixed pipeline order from spec.md §2: tenant →
//! identity → authorizer, ahead of audit and the plugin router.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use catalog_errors::CatalogError;

use crate::authorizer::{map_request, Authorizer};
use crate::identity::extract_identity;
use crate::tenant::{resolve_tenant, TenancyMode, TenantContext};

#[derive(Clone)]
pub struct TenantState {
    pub mode: TenancyMode,
    pub default_namespace: String,
}

pub async fn tenant_layer(State(state): State<TenantState>, mut req: Request, next: Next) -> Response {
    match resolve_tenant(state.mode, &req, &state.default_namespace) {
        Ok(ctx) => {
            req.extensions_mut().insert(ctx);
            next.run(req).await
        }
        Err(err) => err.into_response(),
    }
}

pub async fn identity_layer(mut req: Request, next: Next) -> Response {
    let identity = extract_identity(req.headers());
    req.extensions_mut().insert(identity);
    next.run(req).await
}

#[derive(Clone)]
pub struct AuthzState {
    pub authorizer: Arc<dyn Authorizer>,
}

/// Paths never subject to authorization: health probes and discovery are
/// intentionally open (spec.md §4.3 implies deny-by-default applies only to
/// mapped management/entity paths).
fn is_exempt(path: &str) -> bool {
    matches!(path, "/livez" | "/readyz" | "/healthz" | "/api/plugins")
        || (path.starts_with("/api/plugins/") && path.ends_with("/capabilities"))
}

pub async fn authz_layer(State(state): State<AuthzState>, req: Request, next: Next) -> Response {
    let path = req.uri().path().to_owned();
    if is_exempt(&path) {
        return next.run(req).await;
    }

    let namespace = req.extensions().get::<TenantContext>().map(|t| t.namespace.as_str());
    let Some(authz_req) = map_request(req.method(), &path, namespace) else {
        return CatalogError::forbidden(format!("no authorization mapping for '{path}'")).into_response();
    };

    let identity = req.extensions().get::<crate::identity::Identity>().cloned().unwrap_or_default();

    match state.authorizer.authorize(&identity.user, &identity.groups, &authz_req).await {
        Ok(true) => next.run(req).await,
        Ok(false) => CatalogError::forbidden(format!(
            "user '{}' may not {} {}",
            identity.user, authz_req.verb, authz_req.resource
        ))
        .into_response(),
        Err(err) => err.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorizer::NoopAuthorizer;
    use axum::body::Body;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    async fn ok() -> &'static str {
        "ok"
    }

    #[tokio::test]
    async fn health_and_discovery_paths_skip_authorization() {
        struct DenyAll;
        #[async_trait::async_trait]
        impl Authorizer for DenyAll {
            async fn authorize(
                &self,
                _user: &str,
                _groups: &[String],
                _req: &crate::authorizer::AuthzRequest,
            ) -> Result<bool, CatalogError> {
                Ok(false)
            }
        }

        let state = AuthzState { authorizer: Arc::new(DenyAll) };
        let app = Router::new()
            .route("/livez", get(ok))
            .layer(axum::middleware::from_fn_with_state(state, authz_layer));

        let resp = app
            .oneshot(Request::builder().uri("/livez").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), http::StatusCode::OK);
    }

    #[tokio::test]
    async fn unmapped_path_is_denied_even_with_noop_authorizer() {
        let state = AuthzState { authorizer: Arc::new(NoopAuthorizer) };
        let app = Router::new()
            .route("/totally/unknown", get(ok))
            .layer(axum::middleware::from_fn_with_state(state, authz_layer));

        let resp = app
            .oneshot(Request::builder().uri("/totally/unknown").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), http::StatusCode::FORBIDDEN);
    }
}
