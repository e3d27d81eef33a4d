//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the proxy handler
//! - Wire up middleware (tracing, request ID)
//! - Spawn per-backend health pollers
//! - Route each request to a sticky backend and forward it

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::config::BalancerConfig;
use crate::error::BalancerError;
use crate::health::{HealthMonitor, HttpProbe};
use crate::http::forward::Forwarder;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer, RequestIdExt};
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::routing::{KeySource, StickyRouter};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<StickyRouter>,
    pub forwarder: Forwarder,
    pub key_source: KeySource,
}

/// HTTP server for the balancer.
pub struct HttpServer {
    app: Router,
    config: BalancerConfig,
    router: Arc<StickyRouter>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    ///
    /// Fails if the backend list is empty.
    pub fn new(config: BalancerConfig) -> Result<Self, BalancerError> {
        let router = Arc::new(StickyRouter::from_backends(config.backends.iter().cloned())?);
        let forwarder = Forwarder::new(
            Duration::from_secs(config.timeouts.request_secs),
            config.routing.trace_header,
        );

        let state = AppState {
            router: router.clone(),
            forwarder,
            key_source: config.routing.key.clone(),
        };

        Ok(Self {
            app: Self::build_router(state),
            config,
            router,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/", any(proxy_handler))
            .route("/{*path}", any(proxy_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(set_request_id_layer())
                    .layer(TraceLayer::new_for_http())
                    .layer(propagate_request_id_layer()),
            )
    }

    /// The shared routing core, for inspection.
    pub fn router(&self) -> Arc<StickyRouter> {
        self.router.clone()
    }

    /// Spawn health pollers and serve until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            backends = ?self.router.backend_names(),
            "HTTP server starting"
        );

        let probe = HttpProbe::new(&self.config.health_check);
        let pollers = HealthMonitor::new(self.router.clone(), probe, &self.config.health_check)
            .spawn(&shutdown);

        let stop = shutdown.clone();
        let app = self.app.into_make_service_with_connect_info::<SocketAddr>();
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(async move { stop.wait().await })
            .await;

        // Pollers only exit on the signal; make sure they see it if serve failed.
        shutdown.trigger();
        for poller in pollers {
            let _ = poller.await;
        }

        served?;
        for status in self.router.snapshot() {
            tracing::info!(
                backend = %status.name,
                live = status.live,
                assignments = status.assignments,
                "Final backend state"
            );
        }
        tracing::info!(
            live = self.router.live_count(),
            last_used = ?self.router.last_used(),
            "HTTP server stopped"
        );
        Ok(())
    }
}

/// Main proxy handler.
/// Picks the sticky backend for the request key and forwards the request.
async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let start_time = Instant::now();
    let request_id = request.request_id();

    let (parts, body) = request.into_parts();
    let key = state.key_source.extract(&parts, peer);

    let backend = match state.router.route_request(&key) {
        Ok(backend) => backend,
        Err(e) => {
            tracing::warn!(request_id = %request_id, key = %key, error = %e, "Request not routable");
            let response = e.into_response();
            metrics::record_request(response.status().as_u16(), "none", start_time);
            return response;
        }
    };

    tracing::debug!(
        request_id = %request_id,
        method = %parts.method,
        key = %key,
        backend = %backend,
        "Forwarding request"
    );

    let request = Request::from_parts(parts, body);
    let response = match state.forwarder.forward(&backend, request).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(request_id = %request_id, backend = %backend, error = %e, "Upstream error");
            e.into_response()
        }
    };

    metrics::record_request(response.status().as_u16(), &backend, start_time);
    response
}
