//! Active health checking.
//!
//! # Responsibilities
//! - Run one polling loop per backend on a fixed interval
//! - Probe the backend's health path with a bounded timeout
//! - Feed results into the router's liveness tracker

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::task::JoinHandle;
use tokio::time;

use crate::config::HealthCheckConfig;
use crate::error::ProbeFailure;
use crate::health::state::Transition;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::routing::StickyRouter;

/// A health check against one backend.
pub trait HealthProbe: Send + Sync + 'static {
    /// Probe `backend`. `Ok` means reachable and healthy.
    fn check(&self, backend: &str) -> impl Future<Output = Result<(), ProbeFailure>> + Send;
}

/// HTTP `GET` probe against a fixed path. Only `200 OK` counts as healthy.
#[derive(Clone)]
pub struct HttpProbe {
    client: Client<HttpConnector, Body>,
    path: String,
    timeout: Duration,
}

impl HttpProbe {
    pub fn new(config: &HealthCheckConfig) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Self {
            client,
            path: config.path.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

impl HealthProbe for HttpProbe {
    async fn check(&self, backend: &str) -> Result<(), ProbeFailure> {
        let request = Request::builder()
            .method("GET")
            .uri(format!("http://{}{}", backend, self.path))
            .header("user-agent", "sticky-balancer-health-check")
            .body(Body::empty())
            .map_err(|e| ProbeFailure::Unreachable(e.to_string()))?;

        match time::timeout(self.timeout, self.client.request(request)).await {
            Ok(Ok(response)) if response.status() == StatusCode::OK => Ok(()),
            Ok(Ok(response)) => Err(ProbeFailure::Status(response.status())),
            Ok(Err(e)) => Err(ProbeFailure::Unreachable(e.to_string())),
            Err(_) => Err(ProbeFailure::Timeout(self.timeout.as_secs())),
        }
    }
}

/// Drives the per-backend polling loops.
pub struct HealthMonitor<P> {
    router: Arc<StickyRouter>,
    probe: Arc<P>,
    interval: Duration,
}

impl<P: HealthProbe> HealthMonitor<P> {
    pub fn new(router: Arc<StickyRouter>, probe: P, config: &HealthCheckConfig) -> Self {
        Self {
            router,
            probe: Arc::new(probe),
            interval: Duration::from_secs(config.interval_secs),
        }
    }

    /// Override the polling interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Spawn one polling task per configured backend.
    pub fn spawn(self, shutdown: &Shutdown) -> Vec<JoinHandle<()>> {
        tracing::info!(
            interval_ms = self.interval.as_millis() as u64,
            backends = self.router.backend_names().len(),
            "Health monitor starting"
        );

        self.router
            .backend_names()
            .into_iter()
            .map(|backend| {
                let poller = BackendPoller {
                    backend,
                    router: self.router.clone(),
                    probe: self.probe.clone(),
                    interval: self.interval,
                };
                tokio::spawn(poller.run(shutdown.clone()))
            })
            .collect()
    }
}

struct BackendPoller<P> {
    backend: String,
    router: Arc<StickyRouter>,
    probe: Arc<P>,
    interval: Duration,
}

impl<P: HealthProbe> BackendPoller<P> {
    async fn run(self, shutdown: Shutdown) {
        // First tick fires immediately so the live set is populated at startup.
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        let stop = shutdown.wait();
        tokio::pin!(stop);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.poll_once().await;
                }
                _ = &mut stop => {
                    tracing::debug!(backend = %self.backend, "Health poller stopping");
                    break;
                }
            }
        }
    }

    async fn poll_once(&self) {
        let healthy = match self.probe.check(&self.backend).await {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(backend = %self.backend, error = %e, "Health check failed");
                false
            }
        };

        match self.router.report(&self.backend, healthy) {
            Some(Transition::Up) => {
                tracing::info!(backend = %self.backend, "Backend is up");
            }
            Some(Transition::Down { purged }) => {
                tracing::warn!(backend = %self.backend, purged, "Backend went down, assignments purged");
                metrics::record_purge(&self.backend, purged);
            }
            Some(Transition::Unchanged { purged }) if purged > 0 => {
                metrics::record_purge(&self.backend, purged);
            }
            _ => {}
        }

        metrics::record_backend_health(&self.backend, healthy);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Probe whose answers are flipped by the test.
    #[derive(Default)]
    struct ScriptedProbe {
        healthy: Mutex<HashMap<String, bool>>,
    }

    impl ScriptedProbe {
        fn set(&self, backend: &str, healthy: bool) {
            self.healthy.lock().unwrap().insert(backend.to_string(), healthy);
        }
    }

    impl HealthProbe for Arc<ScriptedProbe> {
        async fn check(&self, backend: &str) -> Result<(), ProbeFailure> {
            let healthy = self.healthy.lock().unwrap().get(backend).copied().unwrap_or(false);
            if healthy {
                Ok(())
            } else {
                Err(ProbeFailure::Status(StatusCode::SERVICE_UNAVAILABLE))
            }
        }
    }

    fn config() -> HealthCheckConfig {
        HealthCheckConfig {
            interval_secs: 1,
            ..HealthCheckConfig::default()
        }
    }

    #[tokio::test]
    async fn test_first_poll_populates_live_set() {
        let router = Arc::new(StickyRouter::from_backends(["a:1", "b:2"]).unwrap());
        let probe = Arc::new(ScriptedProbe::default());
        probe.set("a:1", true);

        let shutdown = Shutdown::new();
        let handles = HealthMonitor::new(router.clone(), probe.clone(), &config())
            .with_interval(Duration::from_millis(20))
            .spawn(&shutdown);
        assert_eq!(handles.len(), 2);

        time::sleep(Duration::from_millis(60)).await;
        assert!(router.is_live("a:1"));
        assert!(!router.is_live("b:2"));

        shutdown.trigger();
        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_down_transition_purges() {
        let router = Arc::new(StickyRouter::from_backends(["a:1", "b:2"]).unwrap());
        let probe = Arc::new(ScriptedProbe::default());
        probe.set("a:1", true);
        probe.set("b:2", true);

        let shutdown = Shutdown::new();
        let handles = HealthMonitor::new(router.clone(), probe.clone(), &config())
            .with_interval(Duration::from_millis(20))
            .spawn(&shutdown);
        time::sleep(Duration::from_millis(60)).await;

        let owner = router.route_request("/sticky").unwrap();
        probe.set(&owner, false);
        time::sleep(Duration::from_millis(80)).await;

        assert!(!router.is_live(&owner));
        assert_eq!(router.resolve("/sticky"), None);
        assert_ne!(router.route_request("/sticky").unwrap(), owner);

        shutdown.trigger();
        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_pollers_exit_when_already_shut_down() {
        let router = Arc::new(StickyRouter::from_backends(["a:1"]).unwrap());
        let shutdown = Shutdown::new();
        shutdown.trigger();

        let handles = HealthMonitor::new(router, Arc::new(ScriptedProbe::default()), &config())
            .spawn(&shutdown);
        for handle in handles {
            time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
        }
    }

    #[tokio::test]
    async fn test_http_probe_unreachable() {
        let probe = HttpProbe::new(&HealthCheckConfig {
            timeout_secs: 1,
            ..HealthCheckConfig::default()
        });
        // Port 1 on loopback is not listening.
        let result = probe.check("127.0.0.1:1").await;
        assert!(result.is_err());
    }
}
