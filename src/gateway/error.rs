use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failures raised inside the pipeline by a filter or the downstream
/// forwarder. Every variant is caught once at the pipeline boundary and
/// classified; none of them reach the caller of `Pipeline::handle`.
///
/// Missing credentials are not failures: the token relay answers those with
/// a login redirect.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("authorization with the token issuer failed: {0}")]
    Authorization(String),

    #[error("connection to {target} failed: {source}")]
    Connect {
        target: String,
        #[source]
        source: BoxError,
    },

    #[error("request to {target} timed out")]
    Timeout { target: String },

    #[error("no downstream route for path {0}")]
    NoRoute(String),

    #[error("response already written for this request")]
    ResponseCommitted,

    #[error("pipeline finished without producing a response")]
    NoResponse,

    #[error(transparent)]
    Other(BoxError),
}

impl GatewayError {
    pub fn other(err: impl Into<BoxError>) -> Self {
        Self::Other(err.into())
    }
}
