/*
 * Responsibility
 * - Config読み込み → 依存生成 (token store, forwarder, pipeline) → Router 組み立て
 * - Middleware の適用 (principal / request-id)
 * - axum::serve() で起動
 */
use std::{net::SocketAddr, panic, process, sync::Arc};

use anyhow::Result;
use axum::Router;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api;
use crate::config::Config;
use crate::gateway::{
    AccessLogFilter, ErrorRenderer, FallbackRouter, GatewayLog, HttpForwarder, JsonErrorRenderer,
    Pipeline, RouteTable, TokenIssuer, TokenRelayConfig, TokenRelayFilter, TracingLog,
};
use crate::middleware;
use crate::services::{
    cache::{CacheClient, ValkeyClient},
    token_store::{CacheClientStore, InMemoryClientStore},
};
use crate::state::AppState;

fn init_tracing() {
    // Prefer RUST_LOG if set; otherwise use a sensible default.
    // Ex:
    // RUST_LOG=info,gateway.access=info,token_relay_gateway=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        // Always surface panics via tracing (stderr can be hidden depending on how the process is launched).
        tracing::error!(?info, "panic");

        // development: fail fast / production: keep serving
        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<()> {
    init_tracing();
    let config = Config::from_env()?;

    init_panic_hook(!config.app_env.is_production());

    tracing::info!(
        "starting gateway in {:?} mode on {} ({} routes)",
        config.app_env,
        config.addr,
        config.routes.len()
    );

    let state = build_state(&config).await?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    // ConnectInfo: client IP の最終フォールバック (X-Forwarded-For 等がない場合)
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

async fn build_issuer(config: &Config) -> Result<Arc<dyn TokenIssuer>> {
    match &config.token_store_url {
        Some(url) => {
            let cache = ValkeyClient::new(url).await?;
            tracing::info!(backend = cache.backend_name(), "authorized clients read from shared cache");
            Ok(Arc::new(CacheClientStore::new(cache)))
        }
        None => {
            tracing::warn!("TOKEN_STORE_URL not set; authorized clients are kept in memory");
            Ok(Arc::new(InMemoryClientStore::new()))
        }
    }
}

async fn build_state(config: &Config) -> Result<AppState> {
    // Build process-level services here and inject them into the shared application state.
    let log: Arc<dyn GatewayLog> = Arc::new(TracingLog);
    let issuer = build_issuer(config).await?;

    let forwarder = Arc::new(HttpForwarder::new(
        RouteTable::new(config.routes.clone()),
        config.upstream_timeout,
    )?);

    let retry_after = Some(config.retry_after_seconds);
    let renderer: Arc<dyn ErrorRenderer> = Arc::new(JsonErrorRenderer::new(retry_after));
    let fallback = FallbackRouter::new(retry_after);

    let relay = TokenRelayFilter::new(
        TokenRelayConfig {
            registration_id: config.registration_id.clone(),
            user_header: config.user_header.clone(),
            permit_paths: config.permit_paths.clone(),
        },
        issuer,
    );

    let mut builder = Pipeline::builder(forwarder, renderer.clone(), log.clone())
        .access_log(AccessLogFilter::new(log))
        .filter(relay);
    if config.fallback_on_failure {
        builder = builder.fallback_on_failure(fallback.clone());
    }
    let pipeline = builder.build();

    tracing::info!(filters = ?pipeline.filter_names(), "gateway pipeline ready");

    Ok(AppState::new(
        Arc::new(pipeline),
        fallback,
        renderer,
        config.principal_header.clone(),
        config.request_body_limit,
        config.static_dir.clone(),
    ))
}

fn build_router(state: AppState) -> Router {
    let router = middleware::principal::apply(api::routes(), state.clone()).with_state(state);

    // request-id は最外周 (pipeline より前)
    middleware::http::apply(router)
}
