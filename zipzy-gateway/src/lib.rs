//! Zipzy Gateway - route table, token gate, rate limiting and upstream proxying.
//!
//! This crate provides the API gateway in front of the Zipzy backends:
//! - One route table describing every proxied route family
//! - Shared-secret token gate and fixed-window rate limit for internal routes
//! - Header filtering and path rewriting
//! - Upstream dispatch with a uniform timeout
//! - JSON / text response classification
//!
//! ## Architecture
//!
//! ```text
//! Client → Gateway (route match → token gate → rate limit → header filter
//!                   → path rewrite → dispatch → classify) → Backend
//! ```

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod classify;
pub mod error;
pub mod headers;
pub mod proxy;
pub mod rate_limit;
pub mod route_table;
pub mod routes;
pub mod token_gate;

pub use classify::{ProxiedResponse, ResponseBody};
pub use error::GatewayError;
pub use proxy::{Dispatcher, ProxiedRequest};
pub use rate_limit::{FixedWindowLimiter, RateLimitStore};
pub use route_table::{PathRewrite, RouteFamily, RouteRule, RouteTable, UpstreamTarget};
pub use routes::AppState;
pub use token_gate::TokenGate;

use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use zipzy_common::config::Config;

/// Build the gateway router with all routes and middleware.
pub fn build_router(config: &Config) -> anyhow::Result<Router> {
    let state = AppState::from_config(config)?;
    Ok(build_router_with_state(state))
}

/// Build the gateway router around prepared state.
pub fn build_router_with_state(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Body size is enforced inside the pipeline, after the token gate
    routes::build_all_routes(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Start the gateway server.
pub async fn start_server(config: &Config) -> anyhow::Result<()> {
    let addr = SocketAddr::from((
        config.gateway.host.parse::<std::net::IpAddr>()?,
        config.gateway.port,
    ));

    let limiter = Arc::new(FixedWindowLimiter::from_config(&config.rate_limit));
    if config.rate_limit.sweep_interval_secs > 0 {
        rate_limit::spawn_sweeper(
            Arc::clone(&limiter),
            Duration::from_secs(config.rate_limit.sweep_interval_secs),
        );
    }

    let state = AppState::with_limiter(config, limiter)?;
    let router = build_router_with_state(state);

    tracing::info!(
        backend = %config.upstream.backend_url,
        legacy = %config.upstream.legacy_url,
        timeout_secs = config.upstream.timeout_secs,
        "Starting Zipzy Gateway on {}",
        addr
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
