use axum::{Json, Router, routing::get};
use serde::Serialize;

use crate::adapters::http::app_state::AppState;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "OK" })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
