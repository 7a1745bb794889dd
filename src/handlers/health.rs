// src/handlers/health.rs

use axum::{Json, response::IntoResponse};
use serde_json::json;

/// Liveness check. Unauthenticated.
pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}
