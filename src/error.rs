/*
 * Responsibility
 * - handler レベルの AppError 定義 (pipeline の外で起きる失敗: path 不正 / body 上限超過 / body 読み込み失敗)
 * - IntoResponse 実装: pipeline の error と同じ JSON schema
 *   {error, message, timestamp, path, status}
 */
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub path: String,
    pub status: u16,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("request path could not be normalized: {path}")]
    InvalidPath { path: String },
    #[error("request body for {path} exceeds {limit} bytes")]
    PayloadTooLarge { path: String, limit: usize },
    #[error("request body could not be read for {path}: {reason}")]
    UnreadableBody { path: String, reason: String },
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::warn!(error = %self, "request rejected before reaching the pipeline");

        let (status, message, path) = match self {
            AppError::InvalidPath { path } => (
                StatusCode::BAD_REQUEST,
                "The request path is not valid.".to_string(),
                path,
            ),
            AppError::PayloadTooLarge { path, limit } => (
                StatusCode::PAYLOAD_TOO_LARGE,
                format!("The request body exceeds the {limit} byte limit."),
                path,
            ),
            AppError::UnreadableBody { path, .. } => (
                StatusCode::BAD_REQUEST,
                "The request body could not be read.".to_string(),
                path,
            ),
        };

        let body = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error"),
            message,
            timestamp: Utc::now(),
            path,
            status: status.as_u16(),
        };

        (status, Json(body)).into_response()
    }
}
