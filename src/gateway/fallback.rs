//! Degraded-service responses for a named downstream service.

use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::gateway::{classifier::with_retry_after, context::GatewayResponse};

const FALLBACK_ERROR: &str = "Service Temporarily Unavailable";
const FALLBACK_STATUS: &str = "fallback";

#[derive(Debug, Serialize)]
struct FallbackBody<'a> {
    error: &'static str,
    message: String,
    timestamp: DateTime<Utc>,
    service: &'a str,
    status: &'static str,
}

/// Always answers 503 with `{error, message, timestamp, service, status}`.
/// Holds only immutable configuration; two calls for the same service differ
/// only in `timestamp`.
#[derive(Debug, Clone, Default)]
pub struct FallbackRouter {
    retry_after_seconds: Option<u64>,
}

impl FallbackRouter {
    pub fn new(retry_after_seconds: Option<u64>) -> Self {
        Self {
            retry_after_seconds,
        }
    }

    pub fn fallback_for(&self, service: &str) -> GatewayResponse {
        self.fallback_named(service, service)
    }

    /// Same shape as `fallback_for`, with a display name in the message
    /// (used by the dedicated `/fallback/client1`-style shortcuts).
    pub fn fallback_named(&self, service: &str, display_name: &str) -> GatewayResponse {
        tracing::warn!(service = %service, "service is unavailable, returning fallback response");

        let body = FallbackBody {
            error: FALLBACK_ERROR,
            message: format!(
                "{display_name} service is currently experiencing issues. Please try again later."
            ),
            timestamp: Utc::now(),
            service,
            status: FALLBACK_STATUS,
        };

        let response = GatewayResponse::json(StatusCode::SERVICE_UNAVAILABLE, &body);
        with_retry_after(response, self.retry_after_seconds)
    }
}
