mod cache;
mod coalesce;
mod config;
mod error;
mod handlers;
mod metrics;
mod models;
mod proxy;
mod rate_limit;
mod router;
mod state;
mod text;
mod upstream;

use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cache::MemoryCache;
use crate::config::Args;
use crate::proxy::PromptProxy;
use crate::rate_limit::RateLimiter;
use crate::state::AppState;
use crate::upstream::GeminiClient;

#[tokio::main]
async fn main() {
    // .env is optional; real environment variables win
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("chartie_gateway=info,tower_http=info")
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    if let Err(e) = run(args).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> std::io::Result<()> {
    let api_key = args.api_key();
    if api_key.is_none() {
        warn!("GEMINI_API_KEY is not set; cache misses will fail with a configuration error");
    }

    let gemini = GeminiClient::new(
        reqwest::Client::new(),
        api_key,
        &args.gemini_model,
        &args.gemini_base_url,
        args.upstream_timeout(),
    );
    let cache = Arc::new(MemoryCache::new(args.cache_ttl(), args.cache_max_entries));

    info!("Forwarding to Gemini model {}", gemini.model());
    info!("Cache TTL: {:?}, max entries: {}", cache.ttl(), args.cache_max_entries);
    info!(
        "Rate limit: {} requests per {} seconds",
        args.rate_limit, args.rate_window
    );

    let state = Arc::new(AppState::new(
        PromptProxy::new(cache.clone(), Arc::new(gemini)),
        RateLimiter::new(args.rate_limit, args.rate_window()),
        args.dev,
    ));

    // spawn the background sweeper
    tokio::spawn(expiry_sweeper(cache, state.clone(), args.sweep_interval()));
    let app = router::build_router(state, router::cors_layer(&args.origins()));

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Chartie gateway running on http://localhost:{}", args.port);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
}

// Sweeps expired cache entries and rate-limit windows on a fixed interval,
// runs until the process exits
async fn expiry_sweeper(cache: Arc<MemoryCache>, state: Arc<AppState>, every: Duration) {
    let mut ticker = interval(every);
    info!("Expiry sweeper started (interval: {:?})", every);

    loop {
        ticker.tick().await;
        let removed = cache.purge_expired();
        if removed > 0 {
            debug!(removed, remaining = cache.len(), "Swept expired cache entries");
        }
        let clients = state.rate_limiter.purge_expired();
        if clients > 0 {
            debug!(
                clients,
                remaining = state.rate_limiter.tracked_clients(),
                "Swept idle rate-limit windows"
            );
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
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
    info!("Shutting down");
}
