//! Access logging around the whole filter chain.
//!
//! `AccessLogFilter` is not an ordinary chain element: the pipeline calls
//! `on_enter` before the first filter and `CompletionGuard::complete` after
//! the outcome is settled, so short-circuits and failures are both observed.
//! If the request future is dropped first, the guard still emits an exit
//! record with status `unknown`.
//!
//! The filter only reads the context (apart from the start-time attribute);
//! removing it from the pipeline changes nothing but the log output.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use axum::http::Method;
use chrono::{DateTime, Utc};

use crate::gateway::{
    client_ip::resolve_client_ip,
    context::{RequestContext, START_TIME_ATTR},
    error::GatewayError,
    sink::GatewayLog,
};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";
const NONE: &str = "none";
const UNKNOWN: &str = "unknown";

#[derive(Debug, Clone)]
pub struct EntryRecord {
    pub timestamp: DateTime<Utc>,
    pub request_id: String,
    pub method: Method,
    pub uri: String,
    pub client_ip: String,
    pub user_agent: String,
    pub header_count: usize,
    pub query: String,
}

impl EntryRecord {
    fn capture(ctx: &RequestContext) -> Self {
        Self {
            timestamp: Utc::now(),
            request_id: ctx.request_id().to_string(),
            method: ctx.method.clone(),
            uri: ctx.uri.to_string(),
            client_ip: resolve_client_ip(&ctx.headers, ctx.remote_addr),
            user_agent: ctx
                .headers
                .get(axum::http::header::USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .unwrap_or(UNKNOWN)
                .to_string(),
            header_count: ctx.headers.len(),
            query: ctx.query().unwrap_or(NONE).to_string(),
        }
    }
}

impl fmt::Display for EntryRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] REQUEST: {} {} | RemoteAddr: {} | UserAgent: {} | Headers: {} | QueryParams: {}",
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.method,
            self.uri,
            self.client_ip,
            self.user_agent,
            self.header_count,
            self.query,
        )
    }
}

#[derive(Debug, Clone)]
pub struct ExitRecord {
    pub timestamp: DateTime<Utc>,
    pub request_id: String,
    pub method: Method,
    pub path: String,
    pub status: Option<u16>,
    pub elapsed_ms: u64,
    pub content_length: Option<u64>,
}

impl ExitRecord {
    pub fn status_label(&self) -> String {
        self.status
            .map(|s| s.to_string())
            .unwrap_or_else(|| UNKNOWN.to_string())
    }

    pub fn content_length_label(&self) -> String {
        self.content_length
            .map(|len| format!("{len}B"))
            .unwrap_or_else(|| UNKNOWN.to_string())
    }
}

impl fmt::Display for ExitRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] RESPONSE: {} {} | Status: {} | ResponseTime: {}ms | ContentLength: {}",
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.method,
            self.path,
            self.status_label(),
            self.elapsed_ms,
            self.content_length_label(),
        )
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[derive(Clone)]
pub struct AccessLogFilter {
    log: Arc<dyn GatewayLog>,
}

impl AccessLogFilter {
    pub fn new(log: Arc<dyn GatewayLog>) -> Self {
        Self { log }
    }

    /// Records the start time, emits the entry record, and returns the guard
    /// that owns the exit record.
    pub fn on_enter(&self, ctx: &mut RequestContext) -> CompletionGuard<'_> {
        let start = Instant::now();
        ctx.attributes_mut().insert(START_TIME_ATTR, start);

        self.log.entry(&EntryRecord::capture(ctx));

        CompletionGuard {
            filter: self,
            request_id: ctx.request_id().to_string(),
            method: ctx.method.clone(),
            path: ctx.path().to_string(),
            start,
            armed: true,
        }
    }

    fn on_complete(&self, ctx: &RequestContext, failure: Option<&GatewayError>) {
        let start = ctx
            .attributes()
            .get::<Instant>(START_TIME_ATTR)
            .copied()
            .unwrap_or_else(Instant::now);

        let record = ExitRecord {
            timestamp: Utc::now(),
            request_id: ctx.request_id().to_string(),
            method: ctx.method.clone(),
            path: ctx.path().to_string(),
            status: ctx.response().status().map(|s| s.as_u16()),
            elapsed_ms: elapsed_ms(start),
            content_length: ctx.response().content_length(),
        };

        let error = failure.map(ToString::to_string);
        self.log.exit(&record, error.as_deref());
    }
}

/// Fires the exit record exactly once: through `complete`, or on drop when
/// the request was cancelled before completing.
pub struct CompletionGuard<'a> {
    filter: &'a AccessLogFilter,
    request_id: String,
    method: Method,
    path: String,
    start: Instant,
    armed: bool,
}

impl CompletionGuard<'_> {
    pub fn complete(mut self, ctx: &RequestContext, failure: Option<&GatewayError>) {
        self.armed = false;
        self.filter.on_complete(ctx, failure);
    }
}

impl Drop for CompletionGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let record = ExitRecord {
            timestamp: Utc::now(),
            request_id: std::mem::take(&mut self.request_id),
            method: self.method.clone(),
            path: std::mem::take(&mut self.path),
            status: None,
            elapsed_ms: elapsed_ms(self.start),
            content_length: None,
        };
        self.filter.log.exit(&record, Some("request cancelled"));
    }
}
