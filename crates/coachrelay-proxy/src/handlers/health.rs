use axum::Json;
use axum::response::IntoResponse;

/// Liveness check.
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "ok": true }))
}
