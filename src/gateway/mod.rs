/*
 * Responsibility
 * - The request filter pipeline wrapped around every proxied request
 *   (access log -> token relay -> downstream forwarder)
 * - Failure classification and fallback responses
 * - Contracts for the external collaborators (forwarder, token issuer, log sink)
 */
pub mod access_log;
pub mod classifier;
pub mod client_ip;
pub mod context;
pub mod error;
pub mod fallback;
pub mod filter;
pub mod forwarder;
pub mod issuer;
pub mod path;
pub mod pipeline;
pub mod sink;
pub mod token_relay;

#[cfg(test)]
pub(crate) mod testing;

pub use access_log::AccessLogFilter;
pub use classifier::{ErrorClassification, ErrorClassifier, ErrorKind, ErrorRenderer, JsonErrorRenderer};
pub use context::{GatewayResponse, Principal, RequestContext};
pub use error::GatewayError;
pub use fallback::FallbackRouter;
pub use forwarder::{DownstreamForwarder, HttpForwarder, Route, RouteTable};
pub use issuer::{AuthorizedClient, IssuerError, TokenIssuer};
pub use pipeline::Pipeline;
pub use sink::{GatewayLog, TracingLog};
pub use token_relay::{TokenRelayConfig, TokenRelayFilter};
