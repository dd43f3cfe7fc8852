//! Audit middleware (spec.md §4.4 / C4): the sole writer of normal audit
//! events, wrapped around the management surface of every plugin router.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use chrono::Utc;
use uuid::Uuid;

use crate::model::{AuditEvent, Outcome};
use crate::path;
use crate::store::AuditStore;

#[derive(Clone)]
pub struct AuditConfig {
    pub enabled: bool,
    pub log_denied: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_denied: true,
        }
    }
}

#[derive(Clone)]
pub struct AuditState {
    pub store: Arc<dyn AuditStore>,
    pub config: AuditConfig,
}

fn correlation_id(headers: &HeaderMap, request_id: &str) -> String {
    headers
        .get("X-Correlation-ID")
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| request_id.to_owned())
}

fn request_id(headers: &HeaderMap) -> String {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
        .unwrap_or_default()
}

fn namespace_of(req: &Request) -> String {
    req.extensions()
        .get::<catalog_authz::TenantContext>()
        .map(|t| t.namespace.clone())
        .unwrap_or_else(|| "default".to_owned())
}

fn actor_of(req: &Request) -> String {
    req.extensions()
        .get::<catalog_authz::Identity>()
        .map(|i| i.user.clone())
        .unwrap_or_else(|| "anonymous".to_owned())
}

/// Per spec.md §4.4: all GETs and the three health endpoints are never
/// audited; every other request goes through the full capture pipeline.
fn should_audit(req: &Request) -> bool {
    if matches!(req.uri().path(), "/livez" | "/readyz" | "/healthz") {
        return false;
    }
    req.method() != axum::http::Method::GET
}

pub async fn audit_layer(State(state): State<AuditState>, req: Request, next: Next) -> Response {
    if !state.config.enabled || !should_audit(&req) {
        return next.run(req).await;
    }

    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let headers = req.headers().clone();
    let namespace = namespace_of(&req);
    let actor = actor_of(&req);
    let req_id = request_id(&headers);
    let corr_id = correlation_id(&headers, &req_id);

    let response = next.run(req).await;

    let status = response.status().as_u16();
    let outcome = Outcome::from_status(status);
    if outcome == Outcome::Denied && !state.config.log_denied {
        return response;
    }

    let extracted = path::extract(&method, &path);
    let event = AuditEvent {
        id: Uuid::new_v4(),
        namespace,
        correlation_id: corr_id,
        event_type: "management".to_owned(),
        actor,
        request_id: req_id,
        plugin: extracted.plugin,
        resource_type: extracted.resource_type,
        resource_ids: extracted.resource_ids,
        action: method.to_string(),
        action_verb: extracted.action_verb,
        outcome,
        status_code: status,
        reason: None,
        old_value: None,
        new_value: None,
        metadata: serde_json::Map::new(),
        created_at: Utc::now(),
    };

    let store = state.store.clone();
    tokio::spawn(async move {
        if let Err(err) = store.append(event).await {
            tracing::warn!(error = %err, "failed to append audit event");
        }
    });

    response
}

pub type AuditBody = Body;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_audit_skips_health_and_get() {
        let get = Request::builder().method("GET").uri("/api/x").body(Body::empty()).unwrap();
        assert!(!should_audit(&get));

        let livez = Request::builder().uri("/livez").body(Body::empty()).unwrap();
        assert!(!should_audit(&livez));

        let post = Request::builder().method("POST").uri("/api/x").body(Body::empty()).unwrap();
        assert!(should_audit(&post));
    }

    #[test]
    fn correlation_id_falls_back_to_request_id() {
        let headers = HeaderMap::new();
        assert_eq!(correlation_id(&headers, "req-1"), "req-1");
    }
}
