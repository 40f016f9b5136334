use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use quotaward::config::{AppConfig, LoggingConfig};
use quotaward::http::HttpServer;
use quotaward::ratelimit::{PolicyName, RateLimiterRegistry};

/// In-process sliding-window rate limiting service.
#[derive(Debug, Parser)]
#[command(name = "quotaward", version, about)]
struct Args {
    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the HTTP listen address
    #[arg(long)]
    http_addr: Option<SocketAddr>,

    /// Override the log filter (RUST_LOG still wins)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config =
        AppConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(addr) = args.http_addr {
        config.server.http_addr = addr;
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }

    init_tracing(&config.logging);

    info!("Starting Quotaward Rate Limiting Service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!(
        http_addr = %config.server.http_addr,
        reclaim_interval_secs = config.reclaimer.interval_secs,
        "Configuration loaded"
    );

    let registry = Arc::new(RateLimiterRegistry::new());
    for name in PolicyName::ALL {
        let policy = name.policy();
        info!(
            policy = %name,
            max_requests = policy.max_requests(),
            window_ms = policy.window_millis(),
            "Policy registered"
        );
    }
    registry.start(config.reclaimer.interval());

    let server = HttpServer::bind(config.server.http_addr, Arc::clone(&registry))
        .await
        .with_context(|| format!("Failed to bind {}", config.server.http_addr))?;

    server.serve_with_shutdown(shutdown_signal()).await?;

    registry.stop().await;
    info!("Quotaward Rate Limiting Service stopped");
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true);

    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Resolve once the process is asked to stop.
async fn shutdown_signal() {
    let signal = wait_for_signal().await;
    info!(signal, "Shutdown requested, no longer accepting connections");
}

#[cfg(unix)]
async fn wait_for_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            warn!(error = %e, "SIGTERM handler unavailable, only Ctrl+C will stop the service");
            return wait_for_ctrl_c().await;
        }
    };

    tokio::select! {
        name = wait_for_ctrl_c() => name,
        _ = sigterm.recv() => "SIGTERM",
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> &'static str {
    wait_for_ctrl_c().await
}

async fn wait_for_ctrl_c() -> &'static str {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Ctrl+C handler unavailable");
        std::future::pending::<()>().await;
    }
    "SIGINT"
}
