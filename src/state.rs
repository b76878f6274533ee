/*
 * Responsibility
 * - Router に紐づける共有コンテキスト (AppState)
 *   - pipeline: 全 proxy リクエストが通る filter chain
 *   - fallback / renderer: /fallback, /error の予約パス用
 *   - static_dir: / と /favicon.ico の配信元
 * - Clone 前提で持つ (内部は Arc/Clone cheap)
 */
use std::{path::PathBuf, sync::Arc};

use axum::http::HeaderName;

use crate::gateway::{ErrorRenderer, FallbackRouter, Pipeline};

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub fallback: FallbackRouter,
    pub renderer: Arc<dyn ErrorRenderer>,
    pub principal_header: HeaderName,
    pub body_limit: usize,
    pub static_dir: PathBuf,
}

impl AppState {
    pub fn new(
        pipeline: Arc<Pipeline>,
        fallback: FallbackRouter,
        renderer: Arc<dyn ErrorRenderer>,
        principal_header: HeaderName,
        body_limit: usize,
        static_dir: PathBuf,
    ) -> Self {
        Self {
            pipeline,
            fallback,
            renderer,
            principal_header,
            body_limit,
            static_dir,
        }
    }
}
