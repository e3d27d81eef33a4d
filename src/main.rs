//! Sticky-hash HTTP load balancer.
//!
//! # Architecture Overview
//!
//! ```text
//!                  ┌──────────────────────────────────────────────────┐
//!                  │                   BALANCER                        │
//!  Client Request  │  ┌────────┐   ┌─────────┐   ┌─────────────────┐  │
//!  ────────────────┼─▶│  http  │──▶│ routing │──▶│  load_balancer  │  │
//!                  │  │ server │   │   key   │   │ hash → registry │  │
//!                  │  └────────┘   └─────────┘   └────────┬────────┘  │
//!                  │                                      │ backend   │
//!  Client Response │  ┌─────────┐                         ▼           │
//!  ◀───────────────┼──│ forward │◀──────────────── sticky backend ────┼──▶ Backend
//!                  │  └─────────┘                                     │
//!                  │  ┌────────────────────────┐                      │
//!                  │  │ health: 1 poller per   │── up/down ──▶ live set│
//!                  │  │ backend, purge on down │                      │
//!                  │  └────────────────────────┘                      │
//!                  └──────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tokio::net::TcpListener;

use sticky_balancer::config::{loader, BalancerConfig};
use sticky_balancer::lifecycle::{signals, Shutdown};
use sticky_balancer::observability::{logging, metrics};
use sticky_balancer::{BalancerError, HttpServer};

#[derive(Parser, Debug)]
#[command(name = "sticky-balancer")]
#[command(about = "HTTP load balancer with sticky hash-based backend assignment", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Load balancer port.
    #[arg(long)]
    port: Option<u16>,

    /// Request and health check timeout in seconds.
    #[arg(long = "timeout-sec")]
    timeout_sec: Option<u64>,

    /// Whether to include the lb-from tracing header in responses.
    #[arg(long, action = clap::ArgAction::Set)]
    trace: Option<bool>,

    /// Backend address; repeat to replace the configured list.
    #[arg(long = "backend", value_name = "HOST:PORT")]
    backends: Vec<String>,
}

impl Cli {
    /// Build the effective configuration: file (or defaults), then flags.
    fn into_config(self) -> Result<BalancerConfig, BalancerError> {
        let mut config = match &self.config {
            Some(path) => loader::read_config(path)?,
            None => BalancerConfig::default(),
        };

        if let Some(port) = self.port {
            let ip = config
                .listener
                .bind_address
                .parse::<SocketAddr>()
                .map(|a| a.ip())
                .unwrap_or_else(|_| [0, 0, 0, 0].into());
            config.listener.bind_address = SocketAddr::new(ip, port).to_string();
        }
        if let Some(secs) = self.timeout_sec {
            config.timeouts.request_secs = secs;
            config.health_check.timeout_secs = secs;
        }
        if let Some(trace) = self.trace {
            config.routing.trace_header = trace;
        }
        if !self.backends.is_empty() {
            config.backends = self.backends;
        }

        loader::validate(&config)?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match cli.into_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("sticky-balancer: {e}");
            return ExitCode::FAILURE;
        }
    };

    logging::init_logging(&config.observability);

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Balancer exited with error");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: BalancerConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("sticky-balancer v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        backends = ?config.backends,
        poll_interval_secs = config.health_check.interval_secs,
        request_timeout_secs = config.timeouts.request_secs,
        trace_header = config.routing.trace_header,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(config)?;

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    server.run(listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("sticky-balancer").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_default_flags() {
        let config = cli(&[]).into_config().unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8090");
        assert_eq!(config.timeouts.request_secs, 3);
        assert!(config.routing.trace_header);
        assert_eq!(config.backends, ["server1:8080", "server2:8080", "server3:8080"]);
    }

    #[test]
    fn test_flag_overrides() {
        let config = cli(&[
            "--port", "9000",
            "--timeout-sec", "5",
            "--trace", "false",
            "--backend", "127.0.0.1:3001",
            "--backend", "127.0.0.1:3002",
        ])
        .into_config()
        .unwrap();

        assert_eq!(config.listener.bind_address, "0.0.0.0:9000");
        assert_eq!(config.timeouts.request_secs, 5);
        assert_eq!(config.health_check.timeout_secs, 5);
        assert!(!config.routing.trace_header);
        assert_eq!(config.backends, ["127.0.0.1:3001", "127.0.0.1:3002"]);
    }

    #[test]
    fn test_invalid_override_is_configuration_error() {
        let err = cli(&["--timeout-sec", "0"]).into_config().unwrap_err();
        assert!(matches!(err, BalancerError::Configuration(_)));
    }
}
