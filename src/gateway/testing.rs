//! Fakes for the pipeline's external collaborators.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::http::{HeaderMap, StatusCode};

use crate::gateway::{
    access_log::{EntryRecord, ExitRecord},
    context::{GatewayResponse, RequestContext},
    error::GatewayError,
    forwarder::DownstreamForwarder,
    issuer::{AuthorizedClient, IssuerError, TokenIssuer},
    sink::{FailureRecord, GatewayLog},
};

#[derive(Default)]
pub struct RecordingLog {
    entries: Mutex<Vec<EntryRecord>>,
    exits: Mutex<Vec<(ExitRecord, Option<String>)>>,
    failures: Mutex<Vec<FailureRecord>>,
}

impl RecordingLog {
    pub fn entries(&self) -> Vec<EntryRecord> {
        self.entries.lock().unwrap().clone()
    }

    pub fn exits(&self) -> Vec<(ExitRecord, Option<String>)> {
        self.exits.lock().unwrap().clone()
    }

    pub fn failures(&self) -> Vec<FailureRecord> {
        self.failures.lock().unwrap().clone()
    }
}

impl GatewayLog for RecordingLog {
    fn entry(&self, record: &EntryRecord) {
        self.entries.lock().unwrap().push(record.clone());
    }

    fn exit(&self, record: &ExitRecord, error: Option<&str>) {
        self.exits
            .lock()
            .unwrap()
            .push((record.clone(), error.map(str::to_string)));
    }

    fn failure(&self, record: &FailureRecord) {
        self.failures.lock().unwrap().push(record.clone());
    }
}

type Respond = Box<dyn Fn() -> Result<GatewayResponse, GatewayError> + Send + Sync>;

pub struct StubForwarder {
    respond: Respond,
    service: Option<String>,
    calls: AtomicUsize,
    last_headers: Mutex<Option<HeaderMap>>,
}

impl StubForwarder {
    pub fn new(
        respond: impl Fn() -> Result<GatewayResponse, GatewayError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            respond: Box::new(respond),
            service: None,
            calls: AtomicUsize::new(0),
            last_headers: Mutex::new(None),
        }
    }

    pub fn ok() -> Self {
        Self::new(|| Ok(GatewayResponse::new(StatusCode::OK).with_body("downstream")))
    }

    pub fn for_service(mut self, service: &str) -> Self {
        self.service = Some(service.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_headers(&self) -> Option<HeaderMap> {
        self.last_headers.lock().unwrap().clone()
    }
}

#[async_trait]
impl DownstreamForwarder for StubForwarder {
    async fn forward(&self, ctx: &RequestContext) -> Result<GatewayResponse, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_headers.lock().unwrap() = Some(ctx.headers.clone());
        (self.respond)()
    }

    fn service_for(&self, _path: &str) -> Option<String> {
        self.service.clone()
    }
}

pub enum StubIssuer {
    Empty,
    Failing,
    Client(AuthorizedClient),
}

impl StubIssuer {
    pub fn empty() -> Self {
        Self::Empty
    }

    pub fn failing() -> Self {
        Self::Failing
    }

    pub fn with_client(client: AuthorizedClient) -> Self {
        Self::Client(client)
    }
}

#[async_trait]
impl TokenIssuer for StubIssuer {
    async fn load_authorized_client(
        &self,
        registration_id: &str,
        principal_name: &str,
    ) -> Result<Option<AuthorizedClient>, IssuerError> {
        match self {
            StubIssuer::Empty => Ok(None),
            StubIssuer::Failing => Err(IssuerError::Lookup("issuer unreachable".into())),
            StubIssuer::Client(client) => Ok(Some(client.clone()).filter(|c| {
                c.registration_id == registration_id && c.principal_name == principal_name
            })),
        }
    }
}
