//! Client IP resolution for access records.
//!
//! Proxy headers win over the transport address. `X-Forwarded-For` is a
//! chain, so only its first hop is used; the single-valued headers are taken
//! as received (no address parsing).

use std::net::SocketAddr;

use axum::http::HeaderMap;

const FORWARDED_FOR: &str = "x-forwarded-for";
/// Checked after `X-Forwarded-For`, highest priority first.
const SINGLE_VALUE_HEADERS: &[&str] = &["x-real-ip", "x-client-ip"];

pub const UNKNOWN_CLIENT: &str = "unknown";

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

pub fn resolve_client_ip(headers: &HeaderMap, remote_addr: Option<SocketAddr>) -> String {
    let first_hop = header_str(headers, FORWARDED_FOR)
        .map(|chain| chain.split(',').next().unwrap_or_default().trim())
        .filter(|hop| !hop.is_empty());

    first_hop
        .or_else(|| {
            SINGLE_VALUE_HEADERS
                .iter()
                .find_map(|name| header_str(headers, name))
        })
        .map(str::to_string)
        .or_else(|| remote_addr.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}
