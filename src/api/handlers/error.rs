/*
 * Responsibility
 * - GET /error: 未処理の失敗を classifier の Generic として描画する予約パス
 * - 認証なし (permit path)
 */
use axum::{
    extract::{OriginalUri, State},
    response::{IntoResponse, Response},
};

use crate::gateway::ErrorKind;
use crate::state::AppState;

pub async fn error_page(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
) -> Response {
    state
        .renderer
        .render(&ErrorKind::Generic.into(), uri.path())
        .into_response()
}
