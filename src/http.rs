//! Small HTTP helpers shared by middleware and handlers.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::middleware::paths::UNEXPECTED_ERROR_PATH;

/// Client address for logging: first `X-Forwarded-For` hop, else the peer
/// address, else `"unknown"`.
pub fn real_ip(req: &Request) -> String {
    let peer = req.extensions().get::<ConnectInfo<SocketAddr>>().map(|ConnectInfo(addr)| *addr);
    client_ip(req.headers(), peer)
}

/// [`real_ip`] for handlers that only hold the headers and connect info.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    forwarded_for(headers)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// `302 Found` to `location`.
pub fn found(location: &str) -> Response {
    match HeaderValue::try_from(location) {
        Ok(value) => (StatusCode::FOUND, [(header::LOCATION, value)]).into_response(),
        Err(_) => (StatusCode::FOUND, [(header::LOCATION, HeaderValue::from_static("/"))]).into_response(),
    }
}

/// Page handlers surface infrastructure failures as a redirect to the
/// generic error page.
pub fn unexpected_error() -> Response {
    found(UNEXPECTED_ERROR_PATH)
}

/// Accepts only same-site relative paths as post-login destinations.
pub fn safe_redirect_target(referer: Option<&str>, fallback: &str) -> String {
    match referer.map(str::trim) {
        Some(r) if r.starts_with('/') && !r.starts_with("//") && !r.contains('\\') => r.to_string(),
        _ => fallback.to_string(),
    }
}

// ── Generic JSON body ────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct GenericSuccessResponse {
    pub success: bool,
    pub message: String,
}

pub fn success_json(message: &str) -> Response {
    Json(GenericSuccessResponse { success: true, message: message.to_string() }).into_response()
}
