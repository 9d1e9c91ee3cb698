use std::str::FromStr;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tracing::{debug, error};

use crate::errors::ServiceError;
use crate::server::server::AppState;
use crate::upstream::datasets::Dataset;

static NOT_AVAILABLE: &str = "not yet available";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/cache/{key}", get(cache_entry))
        .route("/raw/{key}", get(raw_dataset))
}

/// Healthy when the last remote probe passed and a usable token is held.
async fn health(State(state): State<AppState>) -> Response {
    let remote = state.health.status().await;
    let auth = state.tokens.status().await;
    let status = if remote.is_healthy && auth.authenticated { "healthy" } else { "degraded" };

    Json(json!({
        "status": status,
        "remote_config": remote,
        "auth": auth,
    }))
    .into_response()
}

async fn status(State(state): State<AppState>) -> Response {
    let auth = state.tokens.status().await;
    let datasets = state.cache.last_updated().await;

    Json(json!({
        "auth": auth,
        "cache_loops_running": state.cache.is_running().await,
        "datasets": datasets,
    }))
    .into_response()
}

async fn cache_entry(State(state): State<AppState>, Path(key): Path<String>) -> Response {
    let Ok(dataset) = Dataset::from_str(&key) else {
        debug!("unknown cache key requested: {}", key);
        return not_available();
    };

    match state.cache.load(dataset).await {
        Ok(Some(entry)) => Json(json!({
            "data": entry.payload,
            "updated_at": entry.updated_at.to_rfc3339(),
        }))
        .into_response(),
        Ok(None) => not_available(),
        Err(e) => {
            error!(dataset = %dataset, "cache read failed: {:#}", e);
            not_available()
        }
    }
}

/// Passes the upstream response through without touching the cache.
async fn raw_dataset(State(state): State<AppState>, Path(key): Path<String>) -> Response {
    let Ok(dataset) = Dataset::from_str(&key) else {
        return (StatusCode::NOT_FOUND, Json(json!({ "detail": format!("unknown dataset '{}'", key) }))).into_response();
    };

    match state.cache.fetch_live(dataset).await {
        Ok(payload) => Json(payload).into_response(),
        Err(e) => {
            error!(dataset = %dataset, "raw fetch failed: {:#}", e);
            let status = match e.downcast_ref::<ServiceError>() {
                Some(ServiceError::NotAuthenticated) => StatusCode::SERVICE_UNAVAILABLE,
                Some(ServiceError::Upstream { .. }) => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (status, Json(json!({ "detail": format!("{:#}", e) }))).into_response()
        }
    }
}

fn not_available() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "detail": NOT_AVAILABLE }))).into_response()
}
