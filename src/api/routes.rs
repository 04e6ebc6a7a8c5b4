//! API route definitions.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use super::error::ApiError;
use super::state::AppState;
use crate::simulate::SimulationSummary;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/incidents", get(list_incidents))
        .route("/incidents/{id}/trends", get(incident_trends))
        .route("/incidents/{id}/clusters", get(incident_clusters))
        .route("/simulate-alert", post(simulate_alert))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn list_incidents(State(state): State<AppState>) -> Result<Json<Vec<Value>>, ApiError> {
    let store = state.store().snapshot().await?;
    Ok(Json(store.incidents))
}

async fn incident_trends(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Value>>, ApiError> {
    let store = state.store().snapshot().await?;
    Ok(Json(store.trend(&id).to_vec()))
}

async fn incident_clusters(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Value>>, ApiError> {
    let store = state.store().snapshot().await?;
    Ok(Json(store.clusters_for(&id).to_vec()))
}

async fn simulate_alert(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<SimulationSummary>, ApiError> {
    let requested = requested_scenario(&body)?;
    let summary = state.simulator.simulate(requested.as_deref()).await?;
    Ok(Json(summary))
}

/// Pull `scenario` out of an optional JSON body. A missing body, a missing
/// key or a non-string value all mean "no preference".
fn requested_scenario(body: &[u8]) -> Result<Option<String>, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    let value: Value =
        serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    Ok(value
        .get("scenario")
        .and_then(Value::as_str)
        .map(str::to_string))
}
