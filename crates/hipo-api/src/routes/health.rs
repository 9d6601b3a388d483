//! Health check endpoint

use axum::{extract::State, Json};

use crate::dto::HealthResponse;
use crate::AppState;

/// GET /health - API health and endpoint status
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let (network, endpoint_connected) = state
        .engine()
        .store()
        .read(|s| (s.network, s.endpoint_connected));
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        network,
        endpoint_connected,
    })
}
