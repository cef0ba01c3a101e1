//! Client context (IP, user agent) attached to audit entries.

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::HeaderMap;
use axum::http::request::Parts;
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

/// Extract the client IP for logging and rate limiting.
///
/// Order: X-Real-IP (nginx), then the first hop of X-Forwarded-For, then the
/// socket peer address.
pub fn extract_ip(
    headers: &HeaderMap,
    connect_info: Option<&ConnectInfo<SocketAddr>>,
) -> Option<IpAddr> {
    if let Some(ip) = headers.get("X-Real-IP") {
        if let Ok(ip_str) = ip.to_str() {
            if let Ok(ip) = ip_str.parse() {
                return Some(ip);
            }
        }
    }

    if let Some(forwarded) = headers.get("X-Forwarded-For") {
        if let Ok(forwarded_str) = forwarded.to_str() {
            // First entry is the original client
            if let Some(first_ip) = forwarded_str.split(',').next() {
                if let Ok(ip) = first_ip.trim().parse() {
                    return Some(ip);
                }
            }
        }
    }

    connect_info.map(|info| info.0.ip())
}

/// Per-request client context, extracted from headers and the connection.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestContext {
    pub fn from_parts(headers: &HeaderMap, connect_info: Option<&ConnectInfo<SocketAddr>>) -> Self {
        let ip_address = extract_ip(headers, connect_info).map(|ip| ip.to_string());
        let user_agent = headers
            .get(axum::http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        Self {
            ip_address,
            user_agent,
        }
    }
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let connect_info = parts.extensions.get::<ConnectInfo<SocketAddr>>().cloned();
        Ok(RequestContext::from_parts(
            &parts.headers,
            connect_info.as_ref(),
        ))
    }
}
