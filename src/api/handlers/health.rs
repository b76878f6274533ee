/*
 * Responsibility
 * - GET /actuator/health (疎通用)
 * - token relay を通らない permit path
 */
use axum::{Json, http::StatusCode, response::IntoResponse};
use serde_json::json;

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status": "UP"})))
}
