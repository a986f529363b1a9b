use std::sync::Arc;
use std::time::Duration;

use crate::auth::SessionProvider;
use crate::cache::CacheInvalidator;
use crate::llm_client::ContentModel;
use crate::rate_limit::RateLimiter;
use crate::research::MarketResearch;
use crate::store::{IdeaStore, SubscriptionLookup};

/// Tunables for the idea-generation pipeline.
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    /// Generations allowed per user per rate-limit window.
    pub rate_limit_per_window: u64,
    pub rate_limit_window: Duration,
    /// Caller-side race around the whole market research call.
    pub research_timeout: Duration,
    /// Ceiling on drafting an idea (payload validation through schema check).
    /// Persistence and cache signalling run outside it.
    pub request_deadline: Duration,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            rate_limit_per_window: 5,
            rate_limit_window: Duration::from_secs(60),
            research_timeout: Duration::from_secs(10),
            request_deadline: Duration::from_secs(30),
        }
    }
}

/// Shared application state injected into all route handlers via Axum extractors.
///
/// Every external collaborator sits behind a trait object so handlers can be
/// exercised with in-memory fakes.
#[derive(Clone)]
pub struct AppState {
    pub ideas: Arc<dyn IdeaStore>,
    pub subscriptions: Arc<dyn SubscriptionLookup>,
    pub sessions: Arc<dyn SessionProvider>,
    pub rate_limiter: Arc<dyn RateLimiter>,
    pub research: Arc<dyn MarketResearch>,
    pub model: Arc<dyn ContentModel>,
    pub cache: Arc<dyn CacheInvalidator>,
    pub settings: GenerationSettings,
}
