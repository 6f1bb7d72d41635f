//! Shared-secret gate for internal-only route families.
//!
//! Callers present the secret in `x-internal-proxy-token`. The gate fails
//! closed: with no configured secret every request is rejected.

use crate::error::GatewayError;
use axum::http::HeaderMap;
use std::sync::Arc;

/// Header carrying the internal proxy token.
pub const INTERNAL_TOKEN_HEADER: &str = "x-internal-proxy-token";

/// Token gate state shared across requests.
#[derive(Clone)]
pub struct TokenGate {
    expected: Option<Arc<String>>,
}

impl TokenGate {
    /// Create a gate. `None` or an empty secret denies everything.
    pub fn new(expected: Option<String>) -> Self {
        Self {
            expected: expected.filter(|s| !s.is_empty()).map(Arc::new),
        }
    }

    /// Whether a secret is configured at all.
    pub fn is_configured(&self) -> bool {
        self.expected.is_some()
    }

    /// Check the request headers against the configured secret.
    pub fn check(&self, headers: &HeaderMap) -> Result<(), GatewayError> {
        let Some(expected) = self.expected.as_deref() else {
            tracing::warn!("Internal proxy token not configured, rejecting gated request");
            return Err(GatewayError::Unauthorized);
        };

        let provided = headers
            .get(INTERNAL_TOKEN_HEADER)
            .map(|v| v.as_bytes())
            .unwrap_or_default();

        if tokens_match(expected.as_bytes(), provided) {
            Ok(())
        } else {
            tracing::debug!(
                token_present = !provided.is_empty(),
                "Internal proxy token mismatch"
            );
            Err(GatewayError::Unauthorized)
        }
    }
}

impl std::fmt::Debug for TokenGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenGate")
            .field("configured", &self.is_configured())
            .finish()
    }
}

/// Byte equality that does not stop at the first differing byte.
fn tokens_match(expected: &[u8], provided: &[u8]) -> bool {
    if expected.len() != provided.len() {
        return false;
    }
    expected
        .iter()
        .zip(provided)
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}
