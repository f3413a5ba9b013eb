//! camo-proxy daemon.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client                    ┌──────────────────────────────────────────────┐
//!     GET /{digest}/{url} ─────▶│  http server (axum + tower-http layers)      │
//!                               │     │                                        │
//!                               │     ▼                                        │
//!                               │  codec: decode + HMAC verify ──▶ 403         │
//!                               │     │                                        │
//!                               │     ▼                                        │
//!                               │  security filter ─────────────▶ 404          │
//!                               │     │                                        │
//!                               │     ▼                                        │
//!                               │  upstream client (guarded DNS) ──────────────┼──▶ Origin
//!                               │     │                                        │
//!                               │     ▼                                        │
//!     image bytes ◀─────────────│  response policy + metered stream            │
//!                               │                                              │
//!                               │  background: idle reaper, stats, metrics     │
//!                               └──────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use clap::Parser;
use tokio::net::TcpListener;

use camo_proxy::config::loader::{read_config, ConfigError};
use camo_proxy::config::validation::validate_config;
use camo_proxy::config::CamoConfig;
use camo_proxy::lifecycle::{wait_for_signal, Shutdown};
use camo_proxy::net::load_tls_config;
use camo_proxy::observability::{logging, metrics};
use camo_proxy::HttpServer;

/// HMAC-signed image proxy.
#[derive(Parser, Debug)]
#[command(name = "camo-proxy", version, about, long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "CAMO_CONFIG")]
    config: Option<PathBuf>,

    /// HMAC signing key
    #[arg(short, long, env = "CAMO_KEY", hide_env_values = true)]
    key: Option<String>,

    /// Address to listen on
    #[arg(long)]
    listen: Option<String>,

    /// Host allow pattern (repeatable)
    #[arg(long = "allow")]
    allow: Vec<String>,

    /// Host deny pattern (repeatable)
    #[arg(long = "deny")]
    deny: Vec<String>,

    /// Maximum upstream response size in bytes
    #[arg(long)]
    max_size: Option<u64>,

    /// Upstream request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Do not follow upstream redirects
    #[arg(long)]
    no_follow: bool,

    /// Serve the plain-text stats report
    #[arg(long)]
    stats: bool,

    /// Log level (overridden by RUST_LOG)
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    fn apply(self, config: &mut CamoConfig) {
        if let Some(key) = self.key {
            config.signing.hmac_key = key;
        }
        if let Some(listen) = self.listen {
            config.listener.bind_address = listen;
        }
        config.filters.allow_list.extend(self.allow);
        config.filters.deny_list.extend(self.deny);
        if let Some(max_size) = self.max_size {
            config.upstream.max_size = max_size;
        }
        if let Some(timeout) = self.timeout {
            config.upstream.request_timeout_secs = timeout;
        }
        if self.no_follow {
            config.upstream.follow_redirects = false;
        }
        if self.stats {
            config.observability.stats_enabled = true;
        }
        if let Some(level) = self.log_level {
            config.observability.log_level = level;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => read_config(path)?,
        None => CamoConfig::default(),
    };
    args.apply(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;

    logging::init_logging(
        &config.observability.log_level,
        config.observability.log_format,
    )?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "camo-proxy starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        tls = config.listener.tls.is_some(),
        max_size = config.upstream.max_size,
        follow_redirects = config.upstream.follow_redirects,
        request_timeout_secs = config.upstream.request_timeout_secs,
        allow_patterns = config.filters.allow_list.len(),
        deny_patterns = config.filters.deny_list.len(),
        stats_enabled = config.observability.stats_enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            wait_for_signal().await;
            tracing::info!("Shutdown signal received");
            shutdown.trigger();
        }
    });

    let tls = config.listener.tls.clone();
    let bind_address = config.listener.bind_address.clone();
    let server = HttpServer::new(config)?;

    match tls {
        Some(tls) => {
            let rustls =
                load_tls_config(Path::new(&tls.cert_path), Path::new(&tls.key_path)).await?;
            let addr: SocketAddr = bind_address.parse()?;
            server.run_tls(addr, rustls, shutdown).await?;
        }
        None => {
            let listener = TcpListener::bind(&bind_address).await?;
            tracing::info!(address = %listener.local_addr()?, "Listening for connections");
            server.run(listener, shutdown).await?;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
