//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Reject an empty or ambiguous backend list
//! - Validate value ranges (intervals and timeouts > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BalancerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use axum::http::HeaderName;
use thiserror::Error;
use url::Url;

use crate::config::schema::BalancerConfig;
use crate::routing::KeySource;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("backend list must not be empty")]
    NoBackends,

    #[error("backend '{0}' is listed more than once")]
    DuplicateBackend(String),

    #[error("backend '{0}' is not a host:port address")]
    InvalidBackend(String),

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("health check path '{0}' must start with '/'")]
    InvalidHealthPath(String),

    #[error("invalid key header name '{0}'")]
    InvalidKeyHeader(String),

    #[error("invalid listener bind address '{0}'")]
    InvalidBindAddress(String),
}

/// Validate a parsed configuration.
pub fn validate_config(config: &BalancerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.backends.is_empty() {
        errors.push(ValidationError::NoBackends);
    }

    let mut seen = HashSet::new();
    for backend in &config.backends {
        if !is_host_port(backend) {
            errors.push(ValidationError::InvalidBackend(backend.clone()));
        }
        if !seen.insert(backend.as_str()) {
            errors.push(ValidationError::DuplicateBackend(backend.clone()));
        }
    }

    if config.health_check.interval_secs == 0 {
        errors.push(ValidationError::ZeroDuration("health_check.interval_secs"));
    }
    if config.health_check.timeout_secs == 0 {
        errors.push(ValidationError::ZeroDuration("health_check.timeout_secs"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroDuration("timeouts.request_secs"));
    }

    if !config.health_check.path.starts_with('/') {
        errors.push(ValidationError::InvalidHealthPath(config.health_check.path.clone()));
    }

    if let KeySource::Header { name } = &config.routing.key {
        if HeaderName::try_from(name.as_str()).is_err() {
            errors.push(ValidationError::InvalidKeyHeader(name.clone()));
        }
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// True if `addr` is a bare `host:port` authority with a nonzero port.
fn is_host_port(addr: &str) -> bool {
    let Ok(url) = Url::parse(&format!("http://{}", addr)) else {
        return false;
    };
    let explicit_port = addr
        .rsplit_once(':')
        .is_some_and(|(_, port)| port.parse::<u16>().is_ok_and(|p| p != 0));

    explicit_port
        && url.host_str().is_some_and(|h| !h.is_empty())
        && url.path() == "/"
        && url.query().is_none()
        && url.username().is_empty()
        && !addr.ends_with('/')
}
