/*
 * Responsibility
 * - 予約パス以外の全リクエストを受けて RequestContext を組み立てる
 *   - path は dot segment を解決してから渡す (gate / route match / upstream URL で同じ path)
 *   - body は body_limit まで buffer する (超過は 413、読み込み失敗は 400)
 * - Gateway pipeline (access log -> token relay -> forwarder) に渡す
 */
use std::net::SocketAddr;

use axum::{
    body::{Body, Bytes},
    extract::{ConnectInfo, State},
    http::{HeaderMap, Request, header},
    response::{IntoResponse, Response},
};
use http_body_util::{BodyExt, LengthLimitError, Limited};

use crate::error::AppError;
use crate::gateway::{Principal, RequestContext, path::normalize_uri};
use crate::state::AppState;

pub async fn proxy(State(state): State<AppState>, req: Request<Body>) -> Result<Response, AppError> {
    let (mut parts, body) = req.into_parts();
    let raw_path = parts.uri.path().to_string();

    let uri = normalize_uri(parts.uri).map_err(|_| AppError::InvalidPath {
        path: raw_path.clone(),
    })?;

    // ConnectInfo は serve 側で有効化したときだけ入る (テストの oneshot では None)
    let remote_addr = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let principal = parts.extensions.remove::<Principal>();

    let body = read_body(body, &parts.headers, state.body_limit, &raw_path).await?;

    let mut ctx = RequestContext::new(parts.method, uri, parts.headers, remote_addr, body);
    if let Some(principal) = principal {
        ctx.set_principal(principal);
    }

    Ok(state.pipeline.handle(ctx).await.into_response())
}

async fn read_body(
    body: Body,
    headers: &HeaderMap,
    limit: usize,
    path: &str,
) -> Result<Bytes, AppError> {
    let too_large = || AppError::PayloadTooLarge {
        path: path.to_string(),
        limit,
    };

    // 申告済みの Content-Length は読まずに弾く
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
    if declared.is_some_and(|len| len > limit as u64) {
        return Err(too_large());
    }

    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(err) if err.is::<LengthLimitError>() => Err(too_large()),
        Err(err) => Err(AppError::UnreadableBody {
            path: path.to_string(),
            reason: err.to_string(),
        }),
    }
}
