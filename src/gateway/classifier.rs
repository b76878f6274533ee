//! Failure classification and rendering.
//!
//! `ErrorClassifier` maps any `GatewayError` onto one of four kinds, checked
//! in a fixed order (first match wins):
//! authorization -> connection -> timeout -> generic.
//! Wrapped errors are inspected through their `source()` chain so that an
//! I/O or `reqwest` failure buried inside `GatewayError::Other` still lands
//! in the right bucket.

use std::error::Error as StdError;
use std::io;

use axum::http::{HeaderValue, StatusCode, header};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::gateway::{context::GatewayResponse, error::GatewayError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    AuthRequired,
    UpstreamUnavailable,
    UpstreamTimeout,
    Generic,
}

impl ErrorKind {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::AuthRequired => StatusCode::UNAUTHORIZED,
            ErrorKind::UpstreamUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::Generic => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            ErrorKind::AuthRequired => "Authentication required. Please log in to continue.",
            ErrorKind::UpstreamUnavailable => {
                "The requested service is temporarily unavailable. Please try again later."
            }
            ErrorKind::UpstreamTimeout => "The request timed out. Please try again.",
            ErrorKind::Generic => {
                "An unexpected error occurred. Please contact support if the issue persists."
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorClassification {
    pub kind: ErrorKind,
    pub status: StatusCode,
    pub message: &'static str,
}

impl From<ErrorKind> for ErrorClassification {
    fn from(kind: ErrorKind) -> Self {
        Self {
            kind,
            status: kind.status(),
            message: kind.message(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorClassifier;

impl ErrorClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, failure: &GatewayError) -> ErrorClassification {
        let kind = if is_authorization(failure) {
            ErrorKind::AuthRequired
        } else if is_connect(failure) {
            ErrorKind::UpstreamUnavailable
        } else if is_timeout(failure) {
            ErrorKind::UpstreamTimeout
        } else {
            ErrorKind::Generic
        };

        ErrorClassification::from(kind)
    }
}

fn any_cause(
    failure: &GatewayError,
    pred: impl Fn(&(dyn StdError + 'static)) -> bool,
) -> bool {
    // `Other` is transparent, so its own source() skips the wrapped error.
    let head: &(dyn StdError + 'static) = match failure {
        GatewayError::Other(inner) => &**inner,
        other => other,
    };

    let mut current = Some(head);

    while let Some(err) = current {
        if pred(err) {
            return true;
        }
        current = err.source();
    }
    false
}

fn is_authorization(failure: &GatewayError) -> bool {
    matches!(failure, GatewayError::Authorization(_))
}

fn is_connect(failure: &GatewayError) -> bool {
    matches!(failure, GatewayError::Connect { .. })
        || any_cause(failure, |err| {
            err.downcast_ref::<reqwest::Error>()
                .is_some_and(|e| e.is_connect())
                || err.downcast_ref::<io::Error>().is_some_and(|e| {
                    matches!(
                        e.kind(),
                        io::ErrorKind::ConnectionRefused
                            | io::ErrorKind::ConnectionReset
                            | io::ErrorKind::ConnectionAborted
                            | io::ErrorKind::NotConnected
                            | io::ErrorKind::AddrNotAvailable
                    )
                })
        })
}

fn is_timeout(failure: &GatewayError) -> bool {
    matches!(failure, GatewayError::Timeout { .. })
        || any_cause(failure, |err| {
            err.is::<tokio::time::error::Elapsed>()
                || err
                    .downcast_ref::<reqwest::Error>()
                    .is_some_and(|e| e.is_timeout())
                || err
                    .downcast_ref::<io::Error>()
                    .is_some_and(|e| e.kind() == io::ErrorKind::TimedOut)
        })
}

/// Turns a classification into the response the client sees.
pub trait ErrorRenderer: Send + Sync {
    fn render(&self, classification: &ErrorClassification, path: &str) -> GatewayResponse;
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: &'a str,
    timestamp: DateTime<Utc>,
    path: &'a str,
    status: u16,
}

/// Renders `{error, message, timestamp, path, status}`; 503 responses also
/// carry `Retry-After` when configured.
#[derive(Debug, Clone, Default)]
pub struct JsonErrorRenderer {
    retry_after_seconds: Option<u64>,
}

impl JsonErrorRenderer {
    pub fn new(retry_after_seconds: Option<u64>) -> Self {
        Self {
            retry_after_seconds,
        }
    }
}

impl ErrorRenderer for JsonErrorRenderer {
    fn render(&self, classification: &ErrorClassification, path: &str) -> GatewayResponse {
        let status = classification.status;
        let body = ErrorBody {
            error: status.canonical_reason().unwrap_or("Error"),
            message: classification.message,
            timestamp: Utc::now(),
            path,
            status: status.as_u16(),
        };

        let response = GatewayResponse::json(status, &body);
        with_retry_after(response, self.retry_after_seconds)
    }
}

pub(crate) fn with_retry_after(
    response: GatewayResponse,
    retry_after_seconds: Option<u64>,
) -> GatewayResponse {
    match retry_after_seconds {
        Some(seconds) if response.status == StatusCode::SERVICE_UNAVAILABLE => {
            response.with_header(header::RETRY_AFTER, HeaderValue::from(seconds))
        }
        _ => response,
    }
}
