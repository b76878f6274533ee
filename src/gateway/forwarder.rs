//! Downstream forwarding: the last step of every pipeline.
//!
//! The pipeline only knows the `DownstreamForwarder` trait. `HttpForwarder`
//! is the production implementation backed by `reqwest`; it owns the route
//! table and the timeout, so timeout detection happens here and surfaces as
//! `GatewayError::Timeout`.

use std::time::Duration;

use async_trait::async_trait;
use axum::http::{HeaderMap, header};
use url::Url;

use crate::gateway::{
    context::{GatewayResponse, RequestContext},
    error::GatewayError,
    path::normalize_path,
};

#[async_trait]
pub trait DownstreamForwarder: Send + Sync {
    async fn forward(&self, ctx: &RequestContext) -> Result<GatewayResponse, GatewayError>;

    /// Name of the downstream service that would receive `path`, if any.
    fn service_for(&self, _path: &str) -> Option<String> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub service: String,
    pub prefix: String,
    pub upstream: Url,
}

impl Route {
    /// Prefix match on a path-segment boundary (`/orders` matches
    /// `/orders/5` but not `/ordersx`).
    pub fn matches(&self, path: &str) -> bool {
        let prefix = self.prefix.trim_end_matches('/');
        prefix.is_empty()
            || path == prefix
            || path
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('/'))
    }

    /// `path` must already be normalized (see `gateway::path`).
    pub fn target_url(&self, path: &str, query: Option<&str>) -> Url {
        let mut url = self.upstream.clone();
        let path = format!("{}{}", url.path().trim_end_matches('/'), path);
        url.set_path(&path);
        url.set_query(query);
        url
    }
}

#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new(mut routes: Vec<Route>) -> Self {
        // longest prefix first
        routes.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));
        Self { routes }
    }

    pub fn resolve(&self, path: &str) -> Option<&Route> {
        self.routes.iter().find(|route| route.matches(path))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

const HOP_BY_HOP: [header::HeaderName; 8] = [
    header::CONNECTION,
    header::HOST,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

fn end_to_end_headers(headers: &HeaderMap) -> HeaderMap {
    let mut out = headers.clone();
    for name in &HOP_BY_HOP {
        out.remove(name);
    }
    out.remove("keep-alive");
    out
}

fn forward_error(err: reqwest::Error, service: &str) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Timeout {
            target: service.to_string(),
        }
    } else if err.is_connect() {
        GatewayError::Connect {
            target: service.to_string(),
            source: Box::new(err),
        }
    } else {
        GatewayError::other(err)
    }
}

pub struct HttpForwarder {
    http: reqwest::Client,
    routes: RouteTable,
}

impl HttpForwarder {
    pub fn new(routes: RouteTable, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self { http, routes })
    }
}

#[async_trait]
impl DownstreamForwarder for HttpForwarder {
    async fn forward(&self, ctx: &RequestContext) -> Result<GatewayResponse, GatewayError> {
        // route match and target URL share one path
        let path = normalize_path(ctx.path());
        let route = self
            .routes
            .resolve(&path)
            .ok_or_else(|| GatewayError::NoRoute(path.clone()))?;

        let target = route.target_url(&path, ctx.uri.query());
        tracing::debug!(service = %route.service, target = %target, "forwarding request");

        let response = self
            .http
            .request(ctx.method.clone(), target)
            .headers(end_to_end_headers(&ctx.headers))
            .body(ctx.body.clone())
            .send()
            .await
            .map_err(|err| forward_error(err, &route.service))?;

        let status = response.status();
        let headers = end_to_end_headers(response.headers());
        let body = response
            .bytes()
            .await
            .map_err(|err| forward_error(err, &route.service))?;

        Ok(GatewayResponse {
            status,
            headers,
            body,
        })
    }

    fn service_for(&self, path: &str) -> Option<String> {
        self.routes
            .resolve(&normalize_path(path))
            .map(|route| route.service.clone())
    }
}
