use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use folio_guard::config::{GuardConfig, LogFormat, LoggingConfig};
use folio_guard::http::HttpServer;
use folio_guard::ratelimit::{spawn_sweeper, FixedWindowLimiter};

/// Fixed-window rate limiting service for portfolio site forms.
#[derive(Parser, Debug)]
#[command(name = "folio-guard", version, about)]
struct Args {
    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the HTTP listen address
    #[arg(long)]
    http_addr: Option<SocketAddr>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = GuardConfig::load(args.config.as_deref())?;
    if let Some(addr) = args.http_addr {
        config.server.http_addr = addr;
    }
    if args.json_logs {
        config.logging.format = LogFormat::Json;
    }

    init_tracing(&config.logging);

    info!("Starting folio-guard rate limiting service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!(
        config_path = ?args.config,
        http_addr = %config.server.http_addr,
        trusted_proxy_hops = config.server.trusted_proxy_hops,
        window_secs = config.rate_limiting.window_secs,
        max_requests = config.rate_limiting.max_requests,
        "Configuration loaded"
    );

    let rate_limiter = Arc::new(FixedWindowLimiter::with_config(
        config.rate_limiting.limit_config(),
    ));
    info!("Rate limiter initialized");

    let sweeper = config
        .rate_limiting
        .sweep_interval()
        .map(|interval| spawn_sweeper(Arc::clone(&rate_limiter), interval));

    let server = HttpServer::new(config.server.http_addr, rate_limiter)
        .with_trusted_proxy_hops(config.server.trusted_proxy_hops);
    server.serve_with_shutdown(shutdown_signal()).await?;

    if let Some(handle) = sweeper {
        handle.abort();
    }

    info!("folio-guard stopped");
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true);

    match logging.format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
