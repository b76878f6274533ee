//! Per-request state carried through the filter pipeline.
//!
//! A `RequestContext` is created by the proxy handler, owned by exactly one
//! `Pipeline::handle` call, and consumed when the final response is emitted.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;

use axum::{
    body::{Body, Bytes},
    http::{HeaderMap, HeaderValue, Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use crate::gateway::error::GatewayError;

/// `std::time::Instant` captured by the access log on entry.
pub const START_TIME_ATTR: &str = "gateway.start_time";
/// `Principal` resolved by the authentication layer.
pub const PRINCIPAL_ATTR: &str = "gateway.principal";

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Authenticated identity attached to a request by the authentication layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub name: String,
    pub authenticated: bool,
}

impl Principal {
    pub fn authenticated(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            authenticated: true,
        }
    }

    pub fn anonymous(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            authenticated: false,
        }
    }
}

/// String-keyed bag of arbitrary values shared between filters.
#[derive(Default)]
pub struct Attributes {
    values: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl Attributes {
    pub fn insert<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.values.insert(key.into(), Box::new(value));
    }

    /// Returns `None` when the key is missing or holds a different type.
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.values.get(key).and_then(|v| v.downcast_ref::<T>())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for Attributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.values.keys()).finish()
    }
}

/// A fully materialized response produced by a filter, the forwarder, or the
/// error path.
#[derive(Debug, Clone)]
pub struct GatewayResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl GatewayResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_header(mut self, name: header::HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Serializes `body` as JSON and sets the content type.
    pub fn json<T: serde::Serialize>(status: StatusCode, body: &T) -> Self {
        match serde_json::to_vec(body) {
            Ok(bytes) => Self::new(status)
                .with_header(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                )
                .with_body(bytes),
            Err(err) => {
                tracing::error!(error = %err, "failed to serialize response body");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }

    /// Declared `Content-Length`, falling back to the buffered body size.
    pub fn content_length(&self) -> u64 {
        self.headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(self.body.len() as u64)
    }
}

impl IntoResponse for GatewayResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// Write-once holder for the response of one outcome path.
#[derive(Debug, Default)]
pub struct ResponseSlot {
    written: Option<GatewayResponse>,
}

impl ResponseSlot {
    pub fn write(&mut self, response: GatewayResponse) -> Result<(), GatewayError> {
        if self.written.is_some() {
            return Err(GatewayError::ResponseCommitted);
        }
        self.written = Some(response);
        Ok(())
    }

    pub fn is_written(&self) -> bool {
        self.written.is_some()
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.written.as_ref().map(|r| r.status)
    }

    pub fn content_length(&self) -> Option<u64> {
        self.written.as_ref().map(GatewayResponse::content_length)
    }

    pub fn get(&self) -> Option<&GatewayResponse> {
        self.written.as_ref()
    }

    /// Drops whatever the failed path left behind and installs the error
    /// response in its place.
    pub(crate) fn replace(&mut self, response: GatewayResponse) {
        self.written = Some(response);
    }

    fn take(&mut self) -> Option<GatewayResponse> {
        self.written.take()
    }
}

pub struct RequestContext {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub remote_addr: Option<SocketAddr>,
    pub body: Bytes,
    request_id: String,
    attributes: Attributes,
    response: ResponseSlot,
}

impl RequestContext {
    pub fn new(
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        remote_addr: Option<SocketAddr>,
        body: Bytes,
    ) -> Self {
        let request_id = headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        Self {
            method,
            uri,
            headers,
            remote_addr,
            body,
            request_id,
            attributes: Attributes::default(),
            response: ResponseSlot::default(),
        }
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.uri.query().filter(|q| !q.is_empty())
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.attributes.get::<Principal>(PRINCIPAL_ATTR)
    }

    pub fn set_principal(&mut self, principal: Principal) {
        self.attributes.insert(PRINCIPAL_ATTR, principal);
    }

    pub fn response(&self) -> &ResponseSlot {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut ResponseSlot {
        &mut self.response
    }

    /// Freezes the context into its final response.
    pub(crate) fn into_response(mut self) -> Option<GatewayResponse> {
        self.response.take()
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("remote_addr", &self.remote_addr)
            .field("request_id", &self.request_id)
            .field("attributes", &self.attributes)
            .field("response", &self.response.status())
            .finish()
    }
}
