//! Logging sink handle shared by the access log and the error path.
//!
//! One `Arc<dyn GatewayLog>` is created at startup and injected wherever
//! records are emitted; tests swap in a recording implementation.

use axum::http::Method;

use crate::gateway::{
    access_log::{EntryRecord, ExitRecord},
    classifier::ErrorKind,
};

/// A classified failure, logged for operators with the original detail.
#[derive(Debug, Clone)]
pub struct FailureRecord {
    pub method: Method,
    pub uri: String,
    pub kind: ErrorKind,
    pub status: u16,
    pub detail: String,
}

pub trait GatewayLog: Send + Sync {
    fn entry(&self, record: &EntryRecord);

    /// `error` is set when the request ended in a failure or was cancelled.
    fn exit(&self, record: &ExitRecord, error: Option<&str>);

    fn failure(&self, record: &FailureRecord);
}

/// Emits records through `tracing`: access records under `gateway.access`,
/// classified failures under `gateway.error`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLog;

impl GatewayLog for TracingLog {
    fn entry(&self, record: &EntryRecord) {
        tracing::info!(
            target: "gateway.access",
            request_id = %record.request_id,
            method = %record.method,
            uri = %record.uri,
            client_ip = %record.client_ip,
            user_agent = %record.user_agent,
            header_count = record.header_count,
            query = %record.query,
            "{record}"
        );
    }

    fn exit(&self, record: &ExitRecord, error: Option<&str>) {
        match error {
            Some(error) => tracing::error!(
                target: "gateway.access",
                request_id = %record.request_id,
                method = %record.method,
                path = %record.path,
                status = %record.status_label(),
                elapsed_ms = record.elapsed_ms,
                error = %error,
                "{record} - Error: {error}"
            ),
            None => tracing::info!(
                target: "gateway.access",
                request_id = %record.request_id,
                method = %record.method,
                path = %record.path,
                status = %record.status_label(),
                elapsed_ms = record.elapsed_ms,
                "{record}"
            ),
        }
    }

    fn failure(&self, record: &FailureRecord) {
        tracing::error!(
            target: "gateway.error",
            kind = ?record.kind,
            status = record.status,
            method = %record.method,
            uri = %record.uri,
            detail = %record.detail,
            "gateway error occurred"
        );
    }
}
