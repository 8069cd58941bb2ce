use axum::{Json, response::IntoResponse};

// Liveness only, no dependency checks
pub async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "ok": true,
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}
