//! Shared utilities for integration and load testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, http::StatusCode, routing::get, Router};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use sticky_balancer::config::BalancerConfig;
use sticky_balancer::{HttpServer, Shutdown, StickyRouter};

/// Switches and counters of one mock backend.
#[derive(Debug)]
pub struct MockBackend {
    pub addr: SocketAddr,
    healthy: AtomicBool,
    slow: AtomicBool,
    hits: AtomicUsize,
}

impl MockBackend {
    pub fn name(&self) -> String {
        self.addr.to_string()
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    /// Make non-health requests hang longer than any test timeout.
    pub fn set_slow(&self, slow: bool) {
        self.slow.store(slow, Ordering::SeqCst);
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

async fn health(State(mock): State<Arc<MockBackend>>) -> StatusCode {
    if mock.healthy.load(Ordering::SeqCst) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn serve(State(mock): State<Arc<MockBackend>>) -> String {
    mock.hits.fetch_add(1, Ordering::SeqCst);
    if mock.slow.load(Ordering::SeqCst) {
        tokio::time::sleep(Duration::from_secs(10)).await;
    }
    mock.name()
}

/// Start a mock backend on an ephemeral port.
///
/// `/health` answers 200 or 503 depending on the health switch; every other
/// path answers 200 with the backend's address as body.
pub async fn start_mock_backend() -> Arc<MockBackend> {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let mock = Arc::new(MockBackend {
        addr: listener.local_addr().unwrap(),
        healthy: AtomicBool::new(true),
        slow: AtomicBool::new(false),
        hits: AtomicUsize::new(0),
    });

    let app = Router::new()
        .route("/health", get(health))
        .fallback(serve)
        .with_state(mock.clone());

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    mock
}

/// Start a raw TCP backend whose `/health` answers 200 and whose other
/// responses announce a 100-byte body, send three bytes, then stall.
pub async fn start_stalling_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = vec![0u8; 4096];
                let mut read = 0;
                while !buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf[read..]).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => read += n,
                    }
                }

                if buf[..read].starts_with(b"GET /health ") {
                    let _ = socket
                        .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                        .await;
                    return;
                }

                let _ = socket
                    .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\nabc")
                    .await;
                tokio::time::sleep(Duration::from_secs(30)).await;
            });
        }
    });

    addr
}

/// A running balancer under test.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub router: Arc<StickyRouter>,
    pub shutdown: Shutdown,
}

impl TestProxy {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestProxy {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Config pointing at `backends`, polling every second.
pub fn test_config(backends: &[Arc<MockBackend>]) -> BalancerConfig {
    let mut config = BalancerConfig::default();
    config.backends = backends.iter().map(|b| b.name()).collect();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.health_check.interval_secs = 1;
    config.health_check.timeout_secs = 1;
    config.timeouts.request_secs = 1;
    config
}

/// Start the balancer and wait for the first health poll to land.
pub async fn start_proxy(config: BalancerConfig) -> TestProxy {
    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = HttpServer::new(config).unwrap();
    let router = server.router();
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.clone();

    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    tokio::time::sleep(Duration::from_millis(300)).await;

    TestProxy {
        addr,
        router,
        shutdown,
    }
}

/// Client that never pools or proxies, so every request hits the balancer fresh.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Wait long enough for every poller to run at least once more.
pub async fn wait_for_poll() {
    tokio::time::sleep(Duration::from_millis(1500)).await;
}
