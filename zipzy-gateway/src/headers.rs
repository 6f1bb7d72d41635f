//! Header handling for proxied requests.
//!
//! Everything is forwarded except a short deny list of hop-by-hop and
//! transport headers; the upstream always sees a JSON content type when a
//! body may be present.

use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method};
use std::net::SocketAddr;

/// Inbound headers that are never relayed upstream.
pub const STRIPPED_REQUEST_HEADERS: &[HeaderName] = &[
    header::HOST,
    header::CONNECTION,
    header::CONTENT_LENGTH,
    header::ACCEPT_ENCODING,
];

/// Header consulted first for the rate-limit key.
pub const FORWARDED_FOR: &str = "x-forwarded-for";

/// Key shared by every client whose address cannot be determined.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Whether requests with this method carry no body upstream.
pub fn is_bodyless(method: &Method) -> bool {
    *method == Method::GET || *method == Method::HEAD
}

/// Build the header set forwarded to the upstream.
///
/// `authorization` and any custom headers pass through untouched. The
/// content type is forced to `application/json` unless the method is
/// body-less and nothing was sent.
pub fn filter_request_headers(headers: &HeaderMap, method: &Method, body_present: bool) -> HeaderMap {
    let mut forwarded = HeaderMap::with_capacity(headers.len() + 1);

    for (name, value) in headers {
        if STRIPPED_REQUEST_HEADERS.contains(name) {
            continue;
        }
        forwarded.append(name.clone(), value.clone());
    }

    if body_present || !is_bodyless(method) {
        forwarded.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
    }

    forwarded
}

/// Resolve the client identity used for rate limiting.
///
/// Uses the leftmost `x-forwarded-for` entry, then the peer address, then
/// the shared `"unknown"` bucket.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get(FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());

    if let Some(ip) = forwarded {
        return ip.to_string();
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

/// Detect a WebSocket upgrade handshake.
pub fn is_websocket_upgrade(headers: &HeaderMap) -> bool {
    headers
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("websocket"))
}
