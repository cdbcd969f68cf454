use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use gatekeeper::catalog::HttpCatalog;
use gatekeeper::config::GatekeeperConfig;
use gatekeeper::gate::Gatekeeper;
use gatekeeper::http::{router, AppState, HttpServer};
use gatekeeper::identity::IdentityResolver;
use gatekeeper::ratelimit::{MemoryStore, RateLimitRules, RateLimiter};

#[derive(Parser, Debug)]
#[command(name = "gatekeeper")]
#[command(about = "Per-device admission control for the exercise catalog API")]
#[command(version)]
struct Args {
    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// YAML rate limit rules, overriding `rate_limiting.rules_path`
    #[arg(short, long)]
    rules: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if args.log_json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(true)
            .init();
    }

    info!("Starting Gatekeeper");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = GatekeeperConfig::load(args.config.as_deref())?;
    info!(
        http_addr = %config.server.http_addr,
        failure_policy = ?config.rate_limiting.failure_policy,
        "Configuration loaded"
    );

    let rules_path = args
        .rules
        .or_else(|| config.rate_limiting.rules_path.as_ref().map(PathBuf::from));
    let rules = match &rules_path {
        Some(path) => RateLimitRules::from_file(path)?,
        None => RateLimitRules::new(),
    };
    info!(overrides = ?rules.summary(), "Rate limit rules loaded");

    // Initialize the rate limiter
    let rate_limiter = Arc::new(
        RateLimiter::new(Arc::new(MemoryStore::new()))
            .with_failure_policy(config.rate_limiting.failure_policy)
            .with_store_timeout(config.rate_limiting.store_timeout()),
    );
    let sweeper = rate_limiter.clone().spawn_sweeper(
        config.rate_limiting.sweep_interval(),
        config.rate_limiting.idle_eviction(),
    );
    info!("Rate limiter initialized");

    let gatekeeper = Arc::new(Gatekeeper::with_rules(rate_limiter, rules));
    let reloader = rules_path
        .zip(config.rate_limiting.rules_reload_interval())
        .map(|(path, every)| gatekeeper.clone().spawn_rules_reloader(path, every));

    let catalog = Arc::new(HttpCatalog::new(&config.upstream)?);
    info!(base_url = %config.upstream.base_url, "Exercise catalog client ready");

    let state = AppState::new(
        gatekeeper,
        catalog,
        IdentityResolver::new(&config.identity.cookie_name),
    );

    // Run the server with graceful shutdown on Ctrl+C
    HttpServer::new(config.server.http_addr, router(state))
        .serve_with_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    if let Some(reloader) = reloader {
        reloader.abort();
    }

    info!("Gatekeeper stopped");
    Ok(())
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
