//! Token relay: authentication gate in front of the downstream forwarder.
//!
//! Per request:
//! - no principal, or principal not authenticated -> 303 to login
//! - issuer has no client (or the lookup failed) -> 303 to login
//! - client present but token missing/empty -> 303 to login
//! - token present -> `Authorization: Bearer {token}` (+ optional user header), pass through
//!
//! Every gap redirects; nothing without a bearer token is forwarded.
//! Lookup errors are deliberately folded into the redirect path and only
//! logged, so an issuer outage surfaces as a login prompt.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{HeaderName, HeaderValue, StatusCode, header};

use crate::gateway::{
    context::{GatewayResponse, RequestContext},
    filter::{FilterResult, GatewayFilter, Next, Outcome},
    issuer::TokenIssuer,
    path::has_dot_segments,
};

pub const DEFAULT_REGISTRATION_ID: &str = "azure";
pub const DEFAULT_PERMIT_PATHS: &[&str] = &["/actuator", "/login", "/oauth2", "/error", "/fallback"];

const NAME: &str = "token_relay";

#[derive(Debug, Clone)]
pub struct TokenRelayConfig {
    pub registration_id: String,
    /// Also forward the principal name under this header.
    pub user_header: Option<HeaderName>,
    /// Path prefixes that never enter the gate.
    pub permit_paths: Vec<String>,
}

impl Default for TokenRelayConfig {
    fn default() -> Self {
        Self {
            registration_id: DEFAULT_REGISTRATION_ID.to_string(),
            user_header: None,
            permit_paths: DEFAULT_PERMIT_PATHS.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl TokenRelayConfig {
    pub fn login_location(&self) -> String {
        format!("/oauth2/authorization/{}", self.registration_id)
    }

    /// Paths with dot segments are never permitted: they may resolve
    /// outside the prefix they appear to start with.
    pub fn is_permitted(&self, path: &str) -> bool {
        if has_dot_segments(path) {
            return false;
        }
        self.permit_paths.iter().any(|prefix| {
            let prefix = prefix.trim_end_matches('/');
            path == prefix
                || path
                    .strip_prefix(prefix)
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoginReason {
    Unauthenticated,
    NoAuthorizedClient,
    MissingToken,
}

pub struct TokenRelayFilter {
    config: TokenRelayConfig,
    issuer: Arc<dyn TokenIssuer>,
}

impl TokenRelayFilter {
    pub const ORDER: i32 = 0;

    pub fn new(config: TokenRelayConfig, issuer: Arc<dyn TokenIssuer>) -> Self {
        Self { config, issuer }
    }

    fn strip_relayed_headers(&self, ctx: &mut RequestContext) {
        ctx.headers.remove(header::AUTHORIZATION);
        if let Some(user_header) = &self.config.user_header {
            ctx.headers.remove(user_header);
        }
    }

    fn redirect_to_login(&self, ctx: &mut RequestContext, reason: LoginReason) -> FilterResult {
        tracing::debug!(
            path = %ctx.path(),
            reason = ?reason,
            registration_id = %self.config.registration_id,
            "redirecting to login"
        );

        let location = HeaderValue::try_from(self.config.login_location())
            .unwrap_or_else(|_| HeaderValue::from_static("/oauth2/authorization"));

        ctx.response_mut()
            .write(GatewayResponse::new(StatusCode::SEE_OTHER).with_header(header::LOCATION, location))?;

        Ok(Outcome::ShortCircuited(NAME))
    }
}

#[async_trait]
impl GatewayFilter for TokenRelayFilter {
    fn name(&self) -> &'static str {
        NAME
    }

    fn order(&self) -> i32 {
        Self::ORDER
    }

    fn applies_to(&self, ctx: &RequestContext) -> bool {
        !self.config.is_permitted(ctx.path())
    }

    /// Credentials are only ever set by the gate; client-supplied ones are
    /// dropped on permitted paths too.
    fn on_skip(&self, ctx: &mut RequestContext) {
        self.strip_relayed_headers(ctx);
    }

    async fn filter(&self, ctx: &mut RequestContext, next: Next<'_>) -> FilterResult {
        let Some(principal) = ctx.principal().filter(|p| p.authenticated).cloned() else {
            return self.redirect_to_login(ctx, LoginReason::Unauthenticated);
        };

        let client = match self
            .issuer
            .load_authorized_client(&self.config.registration_id, &principal.name)
            .await
        {
            Ok(client) => client,
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    principal = %principal.name,
                    "authorized client lookup failed"
                );
                None
            }
        };

        let Some(client) = client else {
            return self.redirect_to_login(ctx, LoginReason::NoAuthorizedClient);
        };

        let bearer = client
            .access_token()
            .and_then(|token| HeaderValue::try_from(format!("Bearer {token}")).ok());

        let Some(mut bearer) = bearer else {
            return self.redirect_to_login(ctx, LoginReason::MissingToken);
        };
        bearer.set_sensitive(true);

        self.strip_relayed_headers(ctx);
        ctx.headers.insert(header::AUTHORIZATION, bearer);

        if let Some(user_header) = &self.config.user_header {
            match HeaderValue::try_from(principal.name.as_str()) {
                Ok(value) => {
                    ctx.headers.insert(user_header.clone(), value);
                }
                Err(_) => {
                    tracing::warn!(header = %user_header, "principal name is not a valid header value");
                }
            }
        }

        next.run(ctx).await
    }
}
