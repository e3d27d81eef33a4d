//! Error taxonomy for the balancer.
//!
//! # Design Decisions
//! - Configuration errors are fatal and only surface at startup
//! - Routing and forwarding errors surface to the client as 503
//! - Probe failures never leave the health subsystem

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Errors surfaced by the routing core and the request boundary.
#[derive(Debug, Error)]
pub enum BalancerError {
    /// Invalid or empty configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Every backend in the probe ring is down.
    #[error("No live backend available")]
    NoLiveBackend,

    /// Routing succeeded but the chosen backend could not be reached.
    #[error("Forwarding to {backend} failed: {source}")]
    Forward {
        backend: String,
        #[source]
        source: ForwardFailure,
    },
}

impl BalancerError {
    /// HTTP status reported to the client for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            BalancerError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            BalancerError::NoLiveBackend | BalancerError::Forward { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }
}

impl IntoResponse for BalancerError {
    fn into_response(self) -> Response {
        let body = match &self {
            BalancerError::Configuration(_) => "Balancer misconfigured",
            BalancerError::NoLiveBackend => "No live backend available",
            BalancerError::Forward { .. } => "Upstream request failed",
        };
        (self.status(), body).into_response()
    }
}

/// Why a forwarded request did not produce a response.
#[derive(Debug, Error)]
pub enum ForwardFailure {
    #[error("request timed out after {0} seconds")]
    Timeout(u64),

    #[error("invalid upstream URI: {0}")]
    InvalidUri(String),

    #[error("upstream error: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),
}

/// Why a health probe counted as unhealthy.
#[derive(Debug, Error)]
pub enum ProbeFailure {
    #[error("probe timed out after {0} seconds")]
    Timeout(u64),

    #[error("backend unreachable: {0}")]
    Unreachable(String),

    #[error("unexpected status {0}")]
    Status(StatusCode),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(BalancerError::NoLiveBackend.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            BalancerError::Forward {
                backend: "a:1".into(),
                source: ForwardFailure::Timeout(3),
            }
            .status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            BalancerError::Configuration("empty".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_forward_error_message_names_backend() {
        let err = BalancerError::Forward {
            backend: "server2:8080".into(),
            source: ForwardFailure::Timeout(3),
        };
        assert_eq!(
            err.to_string(),
            "Forwarding to server2:8080 failed: request timed out after 3 seconds"
        );
    }
}
