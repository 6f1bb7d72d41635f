//! Upstream response classification.
//!
//! The upstream's declared content type alone decides how the body is
//! relayed: JSON is parsed and re-serialized, anything else is passed through
//! byte for byte. The caller's `Accept` header plays no part.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;

/// Content type used when relaying text without a declared type.
pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// Body representation chosen for the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(serde_json::Value),
    /// Upstream bytes, relayed verbatim
    Raw(Bytes),
}

/// Upstream reply prepared for relaying.
#[derive(Debug, Clone, PartialEq)]
pub struct ProxiedResponse {
    pub status: StatusCode,
    pub content_type: String,
    pub body: ResponseBody,
}

impl ProxiedResponse {
    pub fn is_json(&self) -> bool {
        matches!(self.body, ResponseBody::Json(_))
    }
}

/// Whether a content type declares JSON.
pub fn is_json_content_type(content_type: &str) -> bool {
    content_type
        .to_ascii_lowercase()
        .contains("application/json")
}

/// Classify an upstream reply.
///
/// A body declared as JSON that fails to parse is relayed as plain text with
/// the upstream status. An empty body keeps its declared type (204, HEAD).
pub fn classify(status: StatusCode, content_type: Option<&str>, body: Bytes) -> ProxiedResponse {
    let declared = content_type.unwrap_or_default();

    if is_json_content_type(declared) && !body.is_empty() {
        match serde_json::from_slice::<serde_json::Value>(&body) {
            Ok(value) => {
                return ProxiedResponse {
                    status,
                    content_type: "application/json".into(),
                    body: ResponseBody::Json(value),
                };
            }
            Err(e) => {
                tracing::warn!(
                    status = status.as_u16(),
                    error = %e,
                    body_len = body.len(),
                    "Upstream declared JSON but body did not parse, relaying as text"
                );
                return ProxiedResponse {
                    status,
                    content_type: TEXT_PLAIN.into(),
                    body: ResponseBody::Raw(body),
                };
            }
        }
    }

    let content_type = if declared.is_empty() {
        TEXT_PLAIN.to_string()
    } else {
        declared.to_string()
    };

    ProxiedResponse {
        status,
        content_type,
        body: ResponseBody::Raw(body),
    }
}

impl IntoResponse for ProxiedResponse {
    fn into_response(self) -> Response {
        let content_type = HeaderValue::from_str(&self.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static(TEXT_PLAIN));

        let body = match self.body {
            ResponseBody::Json(value) => match serde_json::to_vec(&value) {
                Ok(bytes) => Bytes::from(bytes),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to serialize relayed JSON body");
                    return crate::error::GatewayError::InternalError.into_response();
                }
            },
            ResponseBody::Raw(bytes) => bytes,
        };

        (self.status, [(header::CONTENT_TYPE, content_type)], body).into_response()
    }
}
