//! Service-level endpoints.

use axum::{response::IntoResponse, Json};

/// Health check endpoint for container orchestration.
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "ok": true }))
}
