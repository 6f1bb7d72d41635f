//! Upstream dispatch for Zipzy Gateway.
//!
//! Issues the outbound call with the method, filtered headers and body of the
//! inbound request, then hands the reply to the classifier.

use crate::classify::{classify, ProxiedResponse};
use crate::error::GatewayError;
use crate::headers::is_bodyless;
use axum::http::{header, HeaderMap, Method, StatusCode};
use bytes::Bytes;
use reqwest::Client;
use std::time::Duration;

/// Body sent upstream when a body-carrying method arrives without one.
const EMPTY_JSON_BODY: &[u8] = b"{}";

/// Outbound request, built per inbound call.
#[derive(Debug, Clone)]
pub struct ProxiedRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl ProxiedRequest {
    /// Normalize the body for the method: dropped for GET/HEAD, `{}` when a
    /// body-carrying method sent nothing.
    pub fn from_parts(method: Method, url: String, headers: HeaderMap, body: Bytes) -> Self {
        let body = if is_bodyless(&method) {
            None
        } else if body.is_empty() {
            Some(Bytes::from_static(EMPTY_JSON_BODY))
        } else {
            Some(body)
        };

        Self {
            method,
            url,
            headers,
            body,
        }
    }
}

/// Upstream HTTP client with one timeout for every route family.
#[derive(Clone)]
pub struct Dispatcher {
    client: Client,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send `request` upstream and classify the reply.
    ///
    /// Transport errors are logged here and mapped to [`GatewayError::Timeout`]
    /// or [`GatewayError::BadGateway`].
    pub async fn dispatch(&self, request: ProxiedRequest) -> Result<ProxiedResponse, GatewayError> {
        tracing::debug!(
            method = %request.method,
            target_url = %request.url,
            "Proxying request"
        );

        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .headers(request.headers);

        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| {
            log_transport_error(&request.url, &e);
            map_transport_error(&e)
        })?;

        let status = StatusCode::from_u16(response.status().as_u16())
            .unwrap_or(StatusCode::BAD_GATEWAY);
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        let body = response.bytes().await.map_err(|e| {
            tracing::error!(target_url = %request.url, error = %e, "Failed to read upstream response body");
            map_transport_error(&e)
        })?;

        tracing::debug!(
            target_url = %request.url,
            status = status.as_u16(),
            body_len = body.len(),
            "Upstream responded"
        );

        Ok(classify(status, content_type.as_deref(), body))
    }
}

fn log_transport_error(url: &str, e: &reqwest::Error) {
    tracing::error!(
        target_url = %url,
        error = %e,
        timeout = e.is_timeout(),
        connect = e.is_connect(),
        "Upstream request failed"
    );
}

fn map_transport_error(e: &reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::BadGateway
    }
}
