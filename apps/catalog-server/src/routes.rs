//! Ambient HTTP surface around the plugin routers: discovery, health
//! probes, and the audit/jobs sub-routers (SPEC_FULL §2 supplements on top
//! of spec.md §6).

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Extension, Json, Router};
use catalog_audit::AuditStore;
use catalog_errors::{CatalogError, Result};
use catalog_jobs::{JobStore, ListFilter};
use catalog_kit::registry::PluginRuntime;
use serde_json::{json, Value};
use uuid::Uuid;

#[derive(Clone)]
pub struct DiscoveryState {
    pub runtime: Arc<PluginRuntime>,
}

fn plugin_entry_json(runtime: &PluginRuntime, name: &str) -> Option<Value> {
    let entry = runtime.find(name)?;
    let state = entry.state();
    let last_error = runtime
        .failed()
        .into_iter()
        .find(|f| f.name == name)
        .map(|f| f.error);
    let healthy = state == catalog_kit::registry::PluginState::Serving;
    let initialized = !matches!(
        state,
        catalog_kit::registry::PluginState::Registered | catalog_kit::registry::PluginState::Failed
    );

    Some(json!({
        "name": entry.core.name(),
        "version": entry.core.version(),
        "description": entry.core.description(),
        "basePath": entry.base_path,
        "healthy": healthy,
        "entityKinds": entry.core.entity_kinds(),
        "management": {
            "sourceManager": entry.source_manager.is_some(),
            "refresh": entry.refresher.is_some(),
            "diagnostics": entry.diagnostics.is_some(),
            "actions": false,
        },
        "capabilitiesV2": entry.capabilities_v2.as_ref().map(|p| p.capabilities_v2()),
        "status": {
            "enabled": true,
            "initialized": initialized,
            "serving": healthy,
            "lastError": last_error,
        },
    }))
}

async fn list_plugins(State(state): State<DiscoveryState>) -> Json<Value> {
    let plugins: Vec<Value> = state
        .runtime
        .entries()
        .iter()
        .filter_map(|e| plugin_entry_json(&state.runtime, e.core.name()))
        .collect();
    Json(json!({ "count": plugins.len(), "plugins": plugins }))
}

async fn plugin_capabilities(
    State(state): State<DiscoveryState>,
    Path(name): Path<String>,
) -> Result<Json<Value>> {
    let caps = state
        .runtime
        .capabilities_v2_for(&name)
        .ok_or_else(|| CatalogError::not_found(format!("plugin '{name}' has no capabilities document")))?;
    Ok(Json(serde_json::to_value(caps).unwrap_or(Value::Null)))
}

async fn livez() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// `database`/`initial_load` are always `ok` here: by the time the server
/// accepts connections, `run_server` has already connected the database and
/// completed the migration lock/schema sequence, so only per-plugin health
/// can still make the service unready.
async fn readyz(State(state): State<DiscoveryState>) -> (axum::http::StatusCode, Json<Value>) {
    let readiness = state.runtime.readiness();
    let all_ready = readiness.values().all(|ready| *ready);
    let (status, status_label) = if all_ready {
        (axum::http::StatusCode::OK, "ok")
    } else {
        (axum::http::StatusCode::SERVICE_UNAVAILABLE, "unavailable")
    };
    (
        status,
        Json(json!({
            "status": status_label,
            "plugins": readiness,
            "components": {
                "database": { "status": "ok" },
                "initial_load": { "status": "ok" },
                "plugins": { "status": status_label },
            },
        })),
    )
}

#[must_use]
pub fn discovery_router(state: DiscoveryState) -> Router {
    Router::new()
        .route("/livez", get(livez))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/api/plugins", get(list_plugins))
        .route("/api/plugins/{name}/capabilities", get(plugin_capabilities))
        .with_state(state)
}

fn encode_cursor(created_at: chrono::DateTime<chrono::Utc>, id: Uuid) -> String {
    use base64::Engine;
    let raw = format!("{}|{id}", created_at.to_rfc3339_opts(chrono::SecondsFormat::Nanos, true));
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(raw)
}

fn decode_cursor(token: &str) -> Option<(chrono::DateTime<chrono::Utc>, Uuid)> {
    use base64::Engine;
    let raw = base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(token).ok()?;
    let raw = String::from_utf8(raw).ok()?;
    let (ts, id) = raw.split_once('|')?;
    let ts = chrono::DateTime::parse_from_rfc3339(ts).ok()?.with_timezone(&chrono::Utc);
    let id = Uuid::parse_str(id).ok()?;
    Some((ts, id))
}

async fn list_audit_events(
    Extension(tenant): Extension<catalog_authz::TenantContext>,
    State(store): State<Arc<dyn AuditStore>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>> {
    let mut events = store.list(&tenant.namespace).await?;
    events.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

    if let Some(cursor) = params.get("pageToken").and_then(|t| decode_cursor(t)) {
        events.retain(|e| (e.created_at, e.id) < cursor);
    }

    let page_size = catalog_jobs::clamp_page_size(params.get("pageSize").and_then(|v| v.parse().ok())) as usize;
    let has_more = events.len() > page_size;
    events.truncate(page_size);
    let next_page_token = if has_more {
        events.last().map(|e| encode_cursor(e.created_at, e.id))
    } else {
        None
    };

    Ok(Json(json!({ "items": events, "size": events.len(), "nextPageToken": next_page_token })))
}

async fn get_audit_event(
    Extension(tenant): Extension<catalog_authz::TenantContext>,
    State(store): State<Arc<dyn AuditStore>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>> {
    let event = store
        .get(&tenant.namespace, id)
        .await?
        .ok_or_else(|| CatalogError::not_found(format!("audit event '{id}' not found")))?;
    Ok(Json(serde_json::to_value(event).unwrap_or(Value::Null)))
}

#[must_use]
pub fn audit_router(store: Arc<dyn AuditStore>) -> Router {
    Router::new()
        .route("/", get(list_audit_events))
        .route("/{id}", get(get_audit_event))
        .with_state(store)
}

async fn list_jobs(
    Extension(tenant): Extension<catalog_authz::TenantContext>,
    State(store): State<Arc<dyn JobStore>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>> {
    let filter = ListFilter {
        namespace: Some(tenant.namespace),
        plugin: params.get("plugin").cloned(),
        source_id: params.get("sourceId").cloned(),
        state: None,
        requested_by: None,
        page_size: params.get("pageSize").and_then(|v| v.parse().ok()),
        page_token: params.get("pageToken").cloned(),
    };
    let page = store.list(filter).await?;
    Ok(Json(json!({ "items": page.items, "nextPageToken": page.next_page_token })))
}

async fn get_job(State(store): State<Arc<dyn JobStore>>, Path(id): Path<Uuid>) -> Result<Json<Value>> {
    let job = store
        .get(id)
        .await?
        .ok_or_else(|| CatalogError::not_found(format!("job '{id}' not found")))?;
    Ok(Json(serde_json::to_value(job).unwrap_or(Value::Null)))
}

/// The `{id}:cancel` action suffix can't be expressed as a separate axum
/// path pattern alongside a bare `{id}` GET, so both share the `/{id}`
/// route and this handler validates the `:cancel` suffix itself.
async fn cancel_job(State(store): State<Arc<dyn JobStore>>, Path(raw): Path<String>) -> Result<Json<Value>> {
    let id = raw
        .strip_suffix(":cancel")
        .ok_or_else(|| CatalogError::not_found(format!("no such job action '{raw}'")))?;
    let id = Uuid::parse_str(id).map_err(|_| CatalogError::bad_request("malformed job id"))?;
    store.cancel(id).await?;
    Ok(Json(json!({ "status": "canceled" })))
}

#[must_use]
pub fn jobs_router(store: Arc<dyn JobStore>) -> Router {
    Router::new()
        .route("/", get(list_jobs))
        .route("/{id}", get(get_job).post(cancel_job))
        .with_state(store)
}
