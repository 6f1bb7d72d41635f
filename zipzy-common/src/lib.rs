//! Zipzy Common - Shared configuration, errors and logging for the Zipzy gateway.
//!
//! This crate provides:
//! - Configuration types and loading (file + environment)
//! - Error types and handling utilities
//! - Logging setup and structured logging helpers

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;

pub use config::{
    AssetsConfig, Config, GatewayConfig, ObservabilityConfig, RateLimitConfig, SecurityConfig,
    UpstreamConfig,
};
pub use error::{Error, Result};

