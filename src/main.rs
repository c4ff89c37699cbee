use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use metrics_gateway::{routes, AppState, GatewayConfig, PrometheusClient, RateLimiter};
use tokio::signal;
use tokio::sync::RwLock;
use tracing::{debug, error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> ExitCode {
    let config = match GatewayConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("metrics-gateway: {e}");
            return ExitCode::FAILURE;
        }
    };

    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let state = Arc::new(RwLock::new(AppState::new()));
    let limiter = RateLimiter::new(state, config.rate_limit_max, config.rate_limit_window);
    let client = PrometheusClient::new(&config.upstream_base_url, config.upstream_timeout);

    spawn_rate_limit_purger(limiter.clone(), config.rate_limit_window);

    let routes = routes(&config, limiter, client);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    let (bound, server) = match warp::serve(routes).try_bind_with_graceful_shutdown(addr, shutdown_signal()) {
        Ok(bound) => bound,
        Err(e) => {
            error!(error = ?e, %addr, "failed to bind");
            return ExitCode::FAILURE;
        }
    };

    info!(
        addr = %bound,
        upstream = %config.upstream_base_url,
        allowed_queries = config.allowed_queries.len(),
        allowed_origins = config.allowed_origins.len(),
        rate_limit_max = config.rate_limit_max,
        rate_limit_window_secs = config.rate_limit_window.as_secs(),
        "Metrics gateway running"
    );
    server.await;

    info!("Metrics gateway stopped");
    ExitCode::SUCCESS
}

fn spawn_rate_limit_purger(limiter: RateLimiter, window: std::time::Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(window);
        loop {
            ticker.tick().await;
            let removed = limiter.purge_expired().await;
            if removed > 0 {
                debug!(removed, "purged expired rate-limit windows");
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!(error = %e, "failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!(error = %e, "failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
