//! Forward HTTP/HTTPS proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!   Client (plain or TLS)
//!       │
//!       ▼
//!   net::listener ──▶ proxy::handler ──▶ http::request (parse)
//!                          │              security::auth
//!                          ├──▶ proxy::tunnel  ──▶ host:port (raw TCP)
//!                          └──▶ proxy::forward ──▶ origin (HTTP/1.1)
//!
//!   Cross-cutting: config, observability, resilience, lifecycle
//! ```

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;

use forward_proxy::config::{Cli, LoggingConfig};
use forward_proxy::net::{bind_all, ListenerMux};
use forward_proxy::observability::{logging, LogHandle};
use forward_proxy::{ProxyServer, Shutdown};

/// Time given to sinks to flush before a fatal exit.
const FATAL_FLUSH_DELAY: Duration = Duration::from_millis(200);

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = cli.load();
    let logging_config = match &config {
        Ok(config) => config.logging.clone(),
        Err(_) => LoggingConfig::default(),
    };
    let log = match logging::init(&logging_config) {
        Ok(log) => log,
        Err(e) => {
            eprintln!("forward-proxy: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let config = match config {
        Ok(config) => config,
        Err(e) => return fatal(&log, "Configuration rejected", &e).await,
    };

    tracing::info!(
        bind_address = %config.listener.bind_address,
        timeout_ms = config.timeout_ms,
        auth = config.auth.kind(),
        "forward-proxy v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    let listeners = match bind_all(&config.listener).await {
        Ok(listeners) => listeners,
        Err(e) => return fatal(&log, "Listener setup failed", &e).await,
    };

    let shutdown = Shutdown::new();
    shutdown.trigger_on_ctrl_c();

    let server = ProxyServer::new(&config);
    if let Err(e) = server.run(ListenerMux::new(listeners), shutdown.subscribe()).await {
        return fatal(&log, "Server stopped", &e).await;
    }

    tracing::info!("Shutdown complete");
    ExitCode::SUCCESS
}

/// Log `error` even when logging is disabled, then give the sinks time to flush.
async fn fatal(log: &LogHandle, message: &str, error: &dyn std::error::Error) -> ExitCode {
    log.force_enable();
    tracing::error!(error = %error, "{}", message);
    tokio::time::sleep(FATAL_FLUSH_DELAY).await;
    ExitCode::FAILURE
}
