//! Route definitions for Zipzy Gateway.
//!
//! Every path under `/api` goes through one proxy handler driven by the
//! [`RouteTable`]; the few locally served endpoints are registered ahead of it.

use crate::error::GatewayError;
use crate::headers::{client_ip, filter_request_headers, is_websocket_upgrade};
use crate::proxy::{Dispatcher, ProxiedRequest};
use crate::rate_limit::{FixedWindowLimiter, RateLimitStore};
use crate::route_table::{RouteTable, UpstreamTarget};
use crate::token_gate::TokenGate;
use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Json, Response},
    routing::{any, get},
    Router,
};
use bytes::Bytes;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::Instrument;
use zipzy_common::config::Config;
use zipzy_common::error::ResultExt;
use zipzy_common::logging::{trace_id_from_headers, TRACE_ID_HEADER};
use zipzy_common::request_span;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<RouteTable>,
    pub dispatcher: Dispatcher,
    pub token_gate: TokenGate,
    pub limiter: Arc<dyn RateLimitStore>,
    pub backend_url: Arc<String>,
    pub legacy_url: Arc<String>,
    pub body_limit: usize,
    pub supabase_setup_path: Arc<PathBuf>,
}

impl AppState {
    /// Build state with an in-memory limiter sized from the config.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let limiter = Arc::new(FixedWindowLimiter::from_config(&config.rate_limit));
        Self::with_limiter(config, limiter)
    }

    /// Build state around a caller-supplied rate-limit store.
    pub fn with_limiter(config: &Config, limiter: Arc<dyn RateLimitStore>) -> anyhow::Result<Self> {
        let token_gate = TokenGate::new(config.security.internal_proxy_token.clone());
        if !token_gate.is_configured() {
            tracing::warn!("PROXY_INTERNAL_TOKEN is not set; legacy server routes will reject all requests");
        }

        Ok(Self {
            routes: Arc::new(RouteTable::default_families()),
            dispatcher: Dispatcher::new(config.upstream.timeout())?,
            token_gate,
            limiter,
            backend_url: Arc::new(config.upstream.backend_url.clone()),
            legacy_url: Arc::new(config.upstream.legacy_url.clone()),
            body_limit: config.gateway.body_limit_bytes,
            supabase_setup_path: Arc::new(config.assets.supabase_setup_path.clone()),
        })
    }

    fn base_url(&self, target: UpstreamTarget) -> &str {
        match target {
            UpstreamTarget::Primary => &self.backend_url,
            UpstreamTarget::Legacy => &self.legacy_url,
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub service: String,
}

/// Build the complete router with all routes.
pub fn build_all_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/legacy/supabase-setup", any(supabase_setup_handler))
        .fallback(proxy_handler)
        .with_state(state)
}

// ─────────────────────────────────────────────────────────────────────────────
// Proxy
// ─────────────────────────────────────────────────────────────────────────────

/// Run one inbound request through the proxy pipeline.
async fn proxy_handler(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    request: Request,
) -> Response {
    let trace_id = trace_id_from_headers(
        request
            .headers()
            .get_all(TRACE_ID_HEADER)
            .iter()
            .filter_map(|v| v.to_str().ok()),
    );
    let span = request_span!(
        "proxy",
        trace_id,
        method = %request.method(),
        path = %request.uri().path()
    );

    let mut response = match run_pipeline(&state, peer.map(|ConnectInfo(addr)| addr), request)
        .instrument(span)
        .await
    {
        Ok(response) => response,
        Err(e) => e.into_response(),
    };

    if let Ok(value) = HeaderValue::from_str(&trace_id) {
        response.headers_mut().insert(TRACE_ID_HEADER, value);
    }
    response
}

async fn run_pipeline(
    state: &AppState,
    peer: Option<SocketAddr>,
    request: Request,
) -> Result<Response, GatewayError> {
    let (parts, body) = request.into_parts();

    let Some(matched) = state.routes.match_path(parts.uri.path()) else {
        tracing::debug!("No route family for path");
        return Err(GatewayError::NotProxied);
    };
    let rule = matched.rule;

    if rule.reject_websocket && is_websocket_upgrade(&parts.headers) {
        tracing::info!(family = %rule.family, "Rejected WebSocket upgrade through gateway");
        return Err(GatewayError::WebSocketNotSupported);
    }

    if rule.requires_token {
        state.token_gate.check(&parts.headers)?;
    }

    if rule.rate_limited {
        let client = client_ip(&parts.headers, peer);
        if !state.limiter.check(&client) {
            tracing::warn!(family = %rule.family, client = %client, "Rate limit exceeded");
            return Err(GatewayError::RateLimited);
        }
    }

    let body = read_body(body, state.body_limit).await?;

    let headers = filter_request_headers(&parts.headers, &parts.method, !body.is_empty());
    let url = rule.upstream_url(
        state.base_url(rule.upstream),
        matched.remainder,
        parts.uri.query(),
    );

    let proxied = ProxiedRequest::from_parts(parts.method, url, headers, body);
    let response = state.dispatcher.dispatch(proxied).await?;

    tracing::info!(
        family = %rule.family,
        status = response.status.as_u16(),
        json = response.is_json(),
        "Proxied request"
    );

    Ok(response.into_response())
}

/// Buffer the inbound body, refusing anything over `limit` bytes.
async fn read_body(body: Body, limit: usize) -> Result<Bytes, GatewayError> {
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.is::<LengthLimitError>() => {
            tracing::warn!(limit, "Inbound request body exceeds limit");
            Err(GatewayError::PayloadTooLarge)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read inbound request body");
            Err(GatewayError::InvalidBody)
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Local endpoints
// ─────────────────────────────────────────────────────────────────────────────

/// Serve the Supabase setup SQL script as plain text, whatever the method.
async fn supabase_setup_handler(State(state): State<AppState>) -> Response {
    let path = state.supabase_setup_path.as_path();
    match tokio::fs::read_to_string(path)
        .await
        .context(format!("reading {}", path.display()))
    {
        Ok(content) => (
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            content,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to load supabase setup file");
            GatewayError::InternalError.into_response()
        }
    }
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        service: "zipzy-gateway".into(),
    })
}
