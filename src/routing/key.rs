//! Client key extraction.
//!
//! # Responsibilities
//! - Derive the sticky routing key from an incoming request
//!
//! # Design Decisions
//! - Path is the default key (one binding per resource path)
//! - Header keys fall back to the path when the header is absent or not UTF-8
//! - Client IP keys bind whole clients to one backend

use std::net::SocketAddr;

use axum::http::request::Parts;
use serde::{Deserialize, Serialize};

/// Where the routing key comes from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum KeySource {
    /// The request URI path.
    #[default]
    Path,
    /// The value of a request header.
    Header { name: String },
    /// The peer IP address.
    ClientIp,
}

impl KeySource {
    /// Extract the routing key for a request.
    pub fn extract(&self, parts: &Parts, peer: SocketAddr) -> String {
        match self {
            KeySource::Path => parts.uri.path().to_string(),
            KeySource::Header { name } => parts
                .headers
                .get(name.as_str())
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
                .unwrap_or_else(|| parts.uri.path().to_string()),
            KeySource::ClientIp => peer.ip().to_string(),
        }
    }
}
