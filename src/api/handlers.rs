//! API Handlers
//!
//! HTTP request handlers mapping each route onto the RPC surface.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};

use crate::error::{Result, ServiceError};
use crate::models::{CallRequest, CallResponse, HealthResponse, MetricsResponse, StatsResponse};
use crate::service::{Blueprint, BlueprintHandler};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub handler: Arc<BlueprintHandler>,
}

impl AppState {
    pub fn new(handler: Arc<BlueprintHandler>) -> Self {
        Self { handler }
    }
}

/// Handler for POST /v1/call
///
/// A body that is not valid JSON for [`CallRequest`] is an invalid argument.
pub async fn call_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<CallRequest>, JsonRejection>,
) -> Result<Json<CallResponse>> {
    let Json(request) = payload.map_err(|e| ServiceError::InvalidArgument(e.body_text()))?;

    let response = state.handler.call(request).await?;
    Ok(Json(response))
}

/// Handler for GET /health
pub async fn health_handler(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    state.handler.health_check().await?;
    Ok(Json(HealthResponse::healthy()))
}

/// Handler for GET /metrics
pub async fn metrics_handler(State(state): State<AppState>) -> Json<MetricsResponse> {
    Json(state.handler.get_metrics().into())
}

/// Handler for POST /metrics/reset
pub async fn reset_metrics_handler(State(state): State<AppState>) -> StatusCode {
    state.handler.reset_metrics();
    StatusCode::NO_CONTENT
}

/// Handler for GET /cache/stats
pub async fn cache_stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(state.handler.cache_stats().into())
}
