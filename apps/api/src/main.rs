mod auth;
mod cache;
mod config;
mod db;
mod errors;
mod generation;
mod library;
mod llm_client;
mod models;
mod rate_limit;
mod research;
mod retry;
mod routes;
mod state;
mod store;
#[cfg(test)]
mod testing;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::auth::PgSessionProvider;
use crate::cache::{CacheInvalidator, LogOnlyInvalidator, RedisCacheInvalidator};
use crate::config::Config;
use crate::db::create_pool;
use crate::llm_client::LlmClient;
use crate::rate_limit::InMemoryRateLimiter;
use crate::research::ExaClient;
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::{PgIdeaStore, PgSubscriptionLookup};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting IdeaForge API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;

    // Initialize Redis (optional)
    let cache: Arc<dyn CacheInvalidator> = match &config.redis_url {
        Some(url) => {
            let client = redis::Client::open(url.as_str())?;
            info!("Redis client initialized");
            Arc::new(RedisCacheInvalidator::new(client))
        }
        None => {
            warn!("REDIS_URL not set; cache invalidation is log-only");
            Arc::new(LogOnlyInvalidator)
        }
    };

    // Initialize market research
    let research = ExaClient::new(config.exa_api_key.clone());
    if !research.is_configured() {
        warn!("EXA_API_KEY not set; market research runs in demo mode");
    }

    // Initialize LLM client
    let llm = LlmClient::new(config.anthropic_api_key.clone())?;
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    // Billing settings are only reported here; no route reads them yet
    info!(
        "Billing config: {} allowed price ids, webhook secret {}",
        config.stripe_allowed_price_ids.len(),
        if config.stripe_webhook_secret.is_some() {
            "present"
        } else {
            "missing"
        }
    );

    // Initialize rate limiter with periodic eviction of stale windows
    let rate_limiter = Arc::new(InMemoryRateLimiter::new());
    {
        let limiter = rate_limiter.clone();
        let window = config.generation.rate_limit_window;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(window * 5);
            loop {
                ticker.tick().await;
                limiter.cleanup(window);
            }
        });
    }
    info!(
        "Generation limits: {} per {:?}, deadline {:?}",
        config.generation.rate_limit_per_window,
        config.generation.rate_limit_window,
        config.generation.request_deadline
    );

    // Build app state
    let state = AppState {
        ideas: Arc::new(PgIdeaStore::new(db.clone())),
        subscriptions: Arc::new(PgSubscriptionLookup::new(db.clone())),
        sessions: Arc::new(PgSessionProvider::new(db)),
        rate_limiter,
        research: Arc::new(research),
        model: Arc::new(llm),
        cache,
        settings: config.generation.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins to the web app domain

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
