//! HTTP handlers mounted under this plugin's base path (spec.md §6).

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use catalog_errors::CatalogError;
use catalog_filter::{apply_filter, paginate, parse_filter, parse_pagination_params, Filterable};
use catalog_kit::contracts::{CapabilitiesV2Provider, DiagnosticsProvider, PluginRefresher, SourceManager};
use catalog_kit::source::SourceConfig;
use serde::{Deserialize, Serialize};

use crate::model::Model;
use crate::plugin::ModelCatalogPlugin;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(rename = "filterQuery")]
    filter_query: Option<String>,
    #[serde(rename = "pageSize")]
    page_size: Option<u32>,
    #[serde(rename = "pageToken")]
    page_token: Option<String>,
    #[serde(rename = "orderBy")]
    order_by: Option<String>,
    #[serde(rename = "sortOrder")]
    sort_order: Option<String>,
}

#[derive(Debug, Serialize)]
struct ListResponse {
    items: Vec<Model>,
    size: usize,
    #[serde(rename = "pageSize")]
    page_size: u32,
    #[serde(rename = "nextPageToken", skip_serializing_if = "Option::is_none")]
    next_page_token: Option<String>,
}

async fn list_models(
    State(plugin): State<Arc<ModelCatalogPlugin>>,
    Query(q): Query<ListQuery>,
) -> Result<impl IntoResponse, CatalogError> {
    let conditions = parse_filter(q.filter_query.as_deref().unwrap_or_default())?;
    let params = parse_pagination_params(q.page_size, q.page_token, q.order_by.clone(), q.sort_order)?;

    let all = plugin.sources().all();
    let matched = apply_filter(&all, &conditions);
    let order_field = q.order_by.clone().unwrap_or_else(|| "name".to_owned());
    let (page, next_page_token) = paginate(
        matched,
        &params,
        |m: &Model| m.field_value(&order_field),
        |m: &Model| m.name.clone(),
    )?;

    Ok(Json(ListResponse {
        size: page.len(),
        page_size: params.page_size,
        next_page_token,
        items: page.into_iter().cloned().collect(),
    }))
}

async fn get_model(
    State(plugin): State<Arc<ModelCatalogPlugin>>,
    Path(name): Path<String>,
) -> Result<Json<Model>, CatalogError> {
    plugin
        .sources()
        .all()
        .into_iter()
        .find(|m| m.name == name)
        .map(Json)
        .ok_or_else(|| CatalogError::not_found(format!("model '{name}' not found")))
}

#[derive(Debug, Serialize)]
struct SourcesResponse {
    sources: Vec<catalog_kit::source::Source>,
    count: usize,
}

async fn list_sources(State(plugin): State<Arc<ModelCatalogPlugin>>) -> Json<SourcesResponse> {
    let sources = plugin.list_sources().await;
    Json(SourcesResponse {
        count: sources.len(),
        sources,
    })
}

#[derive(Debug, Serialize)]
struct ValidateResponse {
    valid: bool,
    errors: Vec<String>,
}

async fn validate_source(
    State(plugin): State<Arc<ModelCatalogPlugin>>,
    Json(cfg): Json<SourceConfig>,
) -> Json<ValidateResponse> {
    match plugin.validate_source(&cfg).await {
        Ok(()) => Json(ValidateResponse { valid: true, errors: Vec::new() }),
        Err(errors) => Json(ValidateResponse { valid: false, errors }),
    }
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    status: &'static str,
}

async fn apply_source(
    State(plugin): State<Arc<ModelCatalogPlugin>>,
    Json(cfg): Json<SourceConfig>,
) -> Result<Json<StatusResponse>, CatalogError> {
    plugin
        .validate_source(&cfg)
        .await
        .map_err(|errors| CatalogError::bad_request(errors.join("; ")))?;
    plugin
        .apply_source(cfg)
        .await
        .map_err(|err| CatalogError::internal(err.to_string()))?;
    Ok(Json(StatusResponse { status: "applied" }))
}

#[derive(Debug, Deserialize)]
pub struct EnableBody {
    enabled: bool,
}

async fn enable_source(
    State(plugin): State<Arc<ModelCatalogPlugin>>,
    Path(id): Path<String>,
    Json(body): Json<EnableBody>,
) -> Result<Json<StatusResponse>, CatalogError> {
    plugin
        .enable_source(&id, body.enabled)
        .await
        .map_err(|err| CatalogError::not_found(err.to_string()))?;
    Ok(Json(StatusResponse { status: "updated" }))
}

async fn delete_source(
    State(plugin): State<Arc<ModelCatalogPlugin>>,
    Path(id): Path<String>,
) -> Result<Json<StatusResponse>, CatalogError> {
    plugin
        .delete_source(&id)
        .await
        .map_err(|err| CatalogError::not_found(err.to_string()))?;
    Ok(Json(StatusResponse { status: "deleted" }))
}

#[derive(Debug, Serialize)]
struct RefreshResult {
    #[serde(rename = "sourceId", skip_serializing_if = "Option::is_none")]
    source_id: Option<String>,
    #[serde(rename = "entitiesLoaded")]
    entities_loaded: u64,
    #[serde(rename = "entitiesRemoved")]
    entities_removed: u64,
    #[serde(rename = "duration")]
    duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

async fn refresh_all(
    State(plugin): State<Arc<ModelCatalogPlugin>>,
) -> Result<Json<RefreshResult>, CatalogError> {
    let outcome = plugin
        .refresh_all()
        .await
        .map_err(|err| CatalogError::internal(err.to_string()))?;
    Ok(Json(RefreshResult {
        source_id: None,
        entities_loaded: outcome.entities_loaded,
        entities_removed: outcome.entities_removed,
        duration_ms: outcome.duration_ms,
        error: None,
    }))
}

async fn refresh_one(
    State(plugin): State<Arc<ModelCatalogPlugin>>,
    Path(source_id): Path<String>,
) -> Result<Json<RefreshResult>, CatalogError> {
    let outcome = plugin
        .refresh(&source_id)
        .await
        .map_err(|err| CatalogError::internal(err.to_string()))?;
    Ok(Json(RefreshResult {
        source_id: Some(source_id),
        entities_loaded: outcome.entities_loaded,
        entities_removed: outcome.entities_removed,
        duration_ms: outcome.duration_ms,
        error: None,
    }))
}

async fn diagnostics(State(plugin): State<Arc<ModelCatalogPlugin>>) -> Json<catalog_kit::contracts::Diagnostics> {
    Json(plugin.diagnostics().await)
}

async fn capabilities_v2(State(plugin): State<Arc<ModelCatalogPlugin>>) -> Json<catalog_kit::capabilities::CapabilitiesV2> {
    Json(plugin.capabilities_v2())
}

/// Builds the router mounted at `{basePath}` by the plugin runtime.
pub fn router(plugin: Arc<ModelCatalogPlugin>) -> Router {
    Router::new()
        .route("/models", get(list_models))
        .route("/models/{name}", get(get_model))
        .route("/capabilities", get(capabilities_v2))
        .route("/management/sources", get(list_sources))
        .route("/management/validate-source", post(validate_source))
        .route("/management/apply-source", post(apply_source))
        .route("/management/sources/{id}/enable", post(enable_source))
        .route("/management/sources/{id}", delete(delete_source))
        .route("/management/refresh", post(refresh_all))
        .route("/management/refresh/{source_id}", post(refresh_one))
        .route("/management/diagnostics", get(diagnostics))
        .with_state(plugin)
}
