/*
 * Responsibility
 * - GET /fallback/{service}: 任意サービスの degraded response
 * - /fallback/client1, /fallback/client2: 同じ shape の名前付きショートカット
 */
use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
};

use crate::state::AppState;

pub async fn service_fallback(
    State(state): State<AppState>,
    Path(service): Path<String>,
) -> Response {
    state.fallback.fallback_for(&service).into_response()
}

pub async fn client1_fallback(State(state): State<AppState>) -> Response {
    state.fallback.fallback_named("client1", "Client1").into_response()
}

pub async fn client2_fallback(State(state): State<AppState>) -> Response {
    state.fallback.fallback_named("client2", "Client2").into_response()
}
