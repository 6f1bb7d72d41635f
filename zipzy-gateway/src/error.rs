//! Gateway-originated failures and their HTTP rendering.
//!
//! Every variant renders as `{"error": "<message>"}` with a fixed message.
//! Underlying causes are logged where they happen and never reach the body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure taxonomy of the proxy pipeline.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayError {
    /// Token gate rejected the request
    #[error("Unauthorized proxy access")]
    Unauthorized,

    /// Fixed-window limit exhausted for this client
    #[error("Rate limit exceeded")]
    RateLimited,

    /// Upstream could not be reached or its reply could not be read
    #[error("Bad gateway")]
    BadGateway,

    /// Upstream did not answer within the configured timeout
    #[error("Upstream timed out")]
    Timeout,

    /// No route family matches the path
    #[error("Not proxied")]
    NotProxied,

    /// WebSocket handshakes must go straight to the backend
    #[error("WebSocket connections should be made directly to the backend")]
    WebSocketNotSupported,

    /// Inbound body could not be read
    #[error("Invalid request body")]
    InvalidBody,

    /// Inbound body exceeds the configured limit
    #[error("Request body too large")]
    PayloadTooLarge,

    /// Unexpected local fault
    #[error("Internal server error")]
    InternalError,
}

impl GatewayError {
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::BadGateway => StatusCode::BAD_GATEWAY,
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
            Self::NotProxied => StatusCode::NOT_FOUND,
            Self::WebSocketNotSupported | Self::InvalidBody => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        (
            self.status_code(),
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
