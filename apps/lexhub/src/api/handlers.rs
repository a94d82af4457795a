//! # API Endpoint Handlers
//!
//! Every handler is a thin call into the hub, the provider or an adapter.
//! Errors become [`ApiError`] responses with a status per error kind.

use super::{
    AppState,
    error::ApiError,
    types::{
        ClearCacheRequest, ClearCacheResponse, HealthResponse, MetricsResponse,
        ModuleAnalyticsRequest, ModuleMutateRequest, ModuleSearchRequest, MutateRequest,
        SuccessResponse,
    },
};
use crate::adapters::ModuleRequest;
use crate::context::ModuleAnalytics;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use lexhub_core::{
    AnalyticsQuery, AnalyticsResult, DataQuery, DataRelationship, MutationResult, Record,
};
use serde_json::Value;

type ApiResult<T> = Result<Json<T>, ApiError>;

// =============================================================================
// HEALTH / METRICS
// =============================================================================

pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    let response = MetricsResponse {
        metrics: state.hub.get_performance_metrics(),
        modules: state.adapters.modules().map(String::from).collect(),
    };
    (StatusCode::OK, Json(response))
}

// =============================================================================
// DATA HUB
// =============================================================================

pub async fn query_handler(
    State(state): State<AppState>,
    Json(query): Json<DataQuery>,
) -> ApiResult<Vec<Record>> {
    Ok(Json(state.hub.query(&query)?))
}

pub async fn mutate_handler(
    State(state): State<AppState>,
    Json(request): Json<MutateRequest>,
) -> ApiResult<MutationResult> {
    let mutation = request.to_mutation()?;
    Ok(Json(state.hub.mutate(&mutation)?))
}

pub async fn analytics_handler(
    State(state): State<AppState>,
    Json(query): Json<AnalyticsQuery>,
) -> ApiResult<AnalyticsResult> {
    Ok(Json(state.hub.analytics(&query)?))
}

pub async fn relationship_handler(
    State(state): State<AppState>,
    Json(relationship): Json<DataRelationship>,
) -> ApiResult<SuccessResponse> {
    state.hub.create_relationship(&relationship)?;
    Ok(Json(SuccessResponse { success: true }))
}

pub async fn clear_cache_handler(
    State(state): State<AppState>,
    Json(request): Json<ClearCacheRequest>,
) -> impl IntoResponse {
    let removed = state.hub.clear_cache(request.pattern.as_deref());
    Json(ClearCacheResponse {
        success: true,
        removed,
    })
}

// =============================================================================
// MODULE ADAPTERS
// =============================================================================

pub async fn module_data_handler(
    State(state): State<AppState>,
    Path(module): Path<String>,
    Json(request): Json<ModuleRequest>,
) -> ApiResult<Value> {
    let adapter = state.adapters.adapter(&module)?;
    Ok(Json(adapter.get_module_data(&request)?))
}

pub async fn module_mutate_handler(
    State(state): State<AppState>,
    Path(module): Path<String>,
    Json(body): Json<ModuleMutateRequest>,
) -> ApiResult<MutationResult> {
    let adapter = state.adapters.adapter(&module)?;
    let result =
        adapter.update_module_data(&body.request, &body.entity, &body.operation, body.data)?;
    Ok(Json(result))
}

pub async fn module_search_handler(
    State(state): State<AppState>,
    Path(module): Path<String>,
    Json(body): Json<ModuleSearchRequest>,
) -> ApiResult<Value> {
    let adapter = state.adapters.adapter(&module)?;
    Ok(Json(adapter.search_module_data(
        &body.request,
        &body.term,
        &body.options,
    )?))
}

pub async fn module_analytics_handler(
    State(state): State<AppState>,
    Path(module): Path<String>,
    Json(body): Json<ModuleAnalyticsRequest>,
) -> ApiResult<ModuleAnalytics> {
    let adapter = state.adapters.adapter(&module)?;
    Ok(Json(
        adapter.get_module_analytics(&body.request, body.time_range)?,
    ))
}
