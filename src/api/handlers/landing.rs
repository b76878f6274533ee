/*
 * Responsibility
 * - GET /: STATIC_DIR/index.html があればそれを返す、なければ組み込みの簡易ページ
 * - GET /favicon.ico: STATIC_DIR/favicon.ico (なければ 404)
 * - どちらも token relay を通らない予約パス
 */
use std::io;

use axum::{
    extract::State,
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
};

use crate::state::AppState;

const BUILTIN_INDEX: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>Token Relay Gateway</title>
    <link rel="icon" type="image/x-icon" href="/favicon.ico">
</head>
<body>
    <h1>Token Relay Gateway</h1>
    <p>Gateway is running.</p>
    <h2>Quick Links</h2>
    <ul>
        <li><a href="/actuator/health">Health Check</a></li>
        <li><a href="/oauth2/authorization/azure">Sign in</a></li>
    </ul>
</body>
</html>
"#;

fn log_read_error(file: &str, err: &io::Error) {
    // 置いていないのは正常系
    if err.kind() != io::ErrorKind::NotFound {
        tracing::warn!(file, error = %err, "static file could not be read");
    }
}

pub async fn index(State(state): State<AppState>) -> Html<String> {
    match tokio::fs::read_to_string(state.static_dir.join("index.html")).await {
        Ok(content) => Html(content),
        Err(err) => {
            log_read_error("index.html", &err);
            Html(BUILTIN_INDEX.to_string())
        }
    }
}

pub async fn favicon(State(state): State<AppState>) -> Response {
    match tokio::fs::read(state.static_dir.join("favicon.ico")).await {
        Ok(content) => ([(header::CONTENT_TYPE, "image/x-icon")], content).into_response(),
        Err(err) => {
            log_read_error("favicon.ico", &err);
            StatusCode::NOT_FOUND.into_response()
        }
    }
}
