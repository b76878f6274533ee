//! 外部認証層 (identity-aware proxy) が付けたヘッダ → Principal を extensions に入れる
//!
//! - The fronting authentication layer terminates the login session and
//!   passes the authenticated user name in a trusted header
//!   (`AUTH_PRINCIPAL_HEADER`, default `x-authenticated-user`).
//! - The header is always removed here, so the name cannot leak downstream
//!   except through the token relay's configured user header.
//! - Requests without the header simply carry no Principal; gating is the
//!   token relay's job.

use axum::{
    Router,
    body::Body,
    extract::State,
    http::Request,
    middleware::{self, Next},
    response::Response,
};

use crate::gateway::Principal;
use crate::state::AppState;

pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    // axum 0.8 の from_fn は State extractor を受け取れないため、`from_fn_with_state` で明示的に state を渡す
    router.layer(middleware::from_fn_with_state(state, principal_middleware))
}

async fn principal_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let name = req
        .headers_mut()
        .remove(&state.principal_header)
        .and_then(|v| v.to_str().ok().map(|s| s.trim().to_string()))
        .filter(|s| !s.is_empty());

    if let Some(name) = name {
        tracing::trace!(principal = %name, "principal resolved");
        // middleware → proxy handler への受け渡し
        req.extensions_mut().insert(Principal::authenticated(name));
    }

    next.run(req).await
}
