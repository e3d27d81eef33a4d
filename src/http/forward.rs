//! Request forwarding to the chosen backend.
//!
//! # Responsibilities
//! - Rewrite the request URI and `Host` header for the backend
//! - Bound the upstream call and every response body frame by the request timeout
//! - Stream the backend response back, optionally tagged with `lb-from`
//!
//! # Design Decisions
//! - Bodies are streamed, never buffered (no retries need a replay)
//! - A failed forward is reported, not retried on another backend

use std::time::Duration;

use axum::body::Body;
use axum::http::{header, HeaderName, HeaderValue, Request, Response, Uri, Version};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tower_http::timeout::TimeoutBody;

use crate::error::{BalancerError, ForwardFailure};

/// Response header naming the backend that served the request.
pub const LB_FROM: HeaderName = HeaderName::from_static("lb-from");

/// Forwards requests over plain HTTP.
#[derive(Clone)]
pub struct Forwarder {
    client: Client<HttpConnector, Body>,
    timeout: Duration,
    trace_header: bool,
}

impl Forwarder {
    pub fn new(timeout: Duration, trace_header: bool) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            client,
            timeout,
            trace_header,
        }
    }

    /// Send `request` to `backend` and return its response.
    pub async fn forward(
        &self,
        backend: &str,
        request: Request<Body>,
    ) -> Result<Response<Body>, BalancerError> {
        let fail = |source| BalancerError::Forward {
            backend: backend.to_string(),
            source,
        };

        let request = rewrite(backend, request).map_err(fail)?;

        let response = match tokio::time::timeout(self.timeout, self.client.request(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(fail(ForwardFailure::Upstream(e))),
            Err(_) => return Err(fail(ForwardFailure::Timeout(self.timeout.as_secs()))),
        };

        let (mut parts, body) = response.into_parts();
        if self.trace_header {
            if let Ok(value) = HeaderValue::from_str(backend) {
                parts.headers.insert(LB_FROM, value);
            }
        }
        // A body that stalls past the timeout ends the stream with an error.
        let body = Body::new(TimeoutBody::new(self.timeout, body));
        Ok(Response::from_parts(parts, body))
    }
}

/// Point `request` at `backend`, keeping path, query, method, headers and body.
fn rewrite(backend: &str, request: Request<Body>) -> Result<Request<Body>, ForwardFailure> {
    let (mut parts, body) = request.into_parts();

    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    parts.uri = Uri::builder()
        .scheme("http")
        .authority(backend)
        .path_and_query(path_and_query)
        .build()
        .map_err(|e| ForwardFailure::InvalidUri(e.to_string()))?;

    let host = HeaderValue::from_str(backend)
        .map_err(|e| ForwardFailure::InvalidUri(e.to_string()))?;
    parts.headers.insert(header::HOST, host);
    parts.version = Version::HTTP_11;

    Ok(Request::from_parts(parts, body))
}
