/*
 * Responsibility
 * - 環境変数 (.env 可) からの設定読み込み: listen port, route table, token relay, token store
 * - 設定値のバリデーション (不正なら起動失敗)
 */
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use axum::http::HeaderName;
use url::Url;

use crate::gateway::{
    forwarder::Route,
    token_relay::{DEFAULT_PERMIT_PATHS, DEFAULT_REGISTRATION_ID},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn parse(raw: Option<String>) -> Self {
        match raw
            .unwrap_or_else(|| "development".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,

    pub routes: Vec<Route>,
    pub upstream_timeout: Duration,

    pub registration_id: String,
    pub user_header: Option<HeaderName>,
    pub principal_header: HeaderName,
    pub permit_paths: Vec<String>,
    // redis://... ; None => in-memory store
    pub token_store_url: Option<String>,

    pub fallback_on_failure: bool,
    pub retry_after_seconds: u64,
    pub request_body_limit: usize,
    // index.html / favicon.ico
    pub static_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port: u16 = match var("PORT") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid("PORT"))?,
            None => 9090,
        };

        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = AppEnv::parse(var("APP_ENV"));

        let routes = parse_routes(
            &var("GATEWAY_ROUTES").ok_or(ConfigError::Missing("GATEWAY_ROUTES"))?,
        )?;

        let upstream_timeout = Duration::from_secs(parse_or(
            &var,
            "UPSTREAM_TIMEOUT_SECONDS",
            30,
        )?);

        let registration_id = var("TOKEN_RELAY_REGISTRATION_ID")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_REGISTRATION_ID.to_string());

        // blank => disabled
        let user_header = match var("TOKEN_RELAY_USER_HEADER")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
        {
            Some(raw) => Some(
                HeaderName::try_from(raw)
                    .map_err(|_| ConfigError::Invalid("TOKEN_RELAY_USER_HEADER"))?,
            ),
            None => None,
        };

        let principal_header = HeaderName::try_from(
            var("AUTH_PRINCIPAL_HEADER").unwrap_or_else(|| "x-authenticated-user".to_string()),
        )
        .map_err(|_| ConfigError::Invalid("AUTH_PRINCIPAL_HEADER"))?;

        let permit_paths = match var("PERMIT_PATHS") {
            Some(raw) => raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>(),
            None => DEFAULT_PERMIT_PATHS.iter().map(|s| s.to_string()).collect(),
        };
        if permit_paths.iter().any(|p| !p.starts_with('/')) {
            return Err(ConfigError::Invalid("PERMIT_PATHS"));
        }

        let token_store_url = var("TOKEN_STORE_URL").filter(|s| !s.trim().is_empty());

        let fallback_on_failure = match var("FALLBACK_ON_FAILURE")
            .unwrap_or_default()
            .to_ascii_lowercase()
            .as_str()
        {
            "" | "false" | "0" | "no" => false,
            "true" | "1" | "yes" => true,
            _ => return Err(ConfigError::Invalid("FALLBACK_ON_FAILURE")),
        };

        let retry_after_seconds = parse_or(&var, "RETRY_AFTER_SECONDS", 30)?;

        let request_body_limit = parse_or(&var, "REQUEST_BODY_LIMIT_BYTES", 1024 * 1024)?;

        let static_dir = PathBuf::from(
            var("STATIC_DIR")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "static".to_string()),
        );

        Ok(Self {
            addr,
            app_env,
            routes,
            upstream_timeout,
            registration_id,
            user_header,
            principal_header,
            permit_paths,
            token_store_url,
            fallback_on_failure,
            retry_after_seconds,
            request_body_limit,
            static_dir,
        })
    }
}

fn parse_or<T: FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match var(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}

/// `service@/prefix=http://host:port`, comma separated.
pub fn parse_routes(raw: &str) -> Result<Vec<Route>, ConfigError> {
    const KEY: &str = "GATEWAY_ROUTES";

    let routes = raw
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (service, rest) = entry.split_once('@').ok_or(ConfigError::Invalid(KEY))?;
            let (prefix, upstream) = rest.split_once('=').ok_or(ConfigError::Invalid(KEY))?;

            let service = service.trim();
            let prefix = prefix.trim();
            if service.is_empty() || !prefix.starts_with('/') {
                return Err(ConfigError::Invalid(KEY));
            }

            let upstream = Url::parse(upstream.trim()).map_err(|_| ConfigError::Invalid(KEY))?;
            if !matches!(upstream.scheme(), "http" | "https") {
                return Err(ConfigError::Invalid(KEY));
            }

            Ok(Route {
                service: service.to_string(),
                prefix: prefix.to_string(),
                upstream,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if routes.is_empty() {
        return Err(ConfigError::Missing(KEY));
    }
    Ok(routes)
}
