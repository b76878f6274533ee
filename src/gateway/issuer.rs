//! Token issuer contract: the lookup side of the OAuth2 client store.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gateway::error::BoxError;

/// (principal, registration) -> access token, as issued after login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizedClient {
    pub principal_name: String,
    pub registration_id: String,
    pub access_token: Option<String>,
}

impl AuthorizedClient {
    pub fn new(
        registration_id: impl Into<String>,
        principal_name: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        Self {
            principal_name: principal_name.into(),
            registration_id: registration_id.into(),
            access_token: Some(access_token.into()),
        }
    }

    /// The token value, or `None` when it is missing or empty.
    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref().filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Error)]
pub enum IssuerError {
    #[error("token issuer lookup failed: {0}")]
    Lookup(#[source] BoxError),
}

/// The store may change concurrently (logins, logouts, expiry), so a client
/// seen on one call can be gone on the next.
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    async fn load_authorized_client(
        &self,
        registration_id: &str,
        principal_name: &str,
    ) -> Result<Option<AuthorizedClient>, IssuerError>;
}
