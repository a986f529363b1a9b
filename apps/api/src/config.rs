use std::time::Duration;

use anyhow::{Context, Result};

use crate::state::GenerationSettings;

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Optional. Without it cache invalidation is log-only.
    pub redis_url: Option<String>,
    pub anthropic_api_key: String,
    /// Optional. Without it market research runs in demo mode (static fallback).
    pub exa_api_key: Option<String>,
    pub stripe_allowed_price_ids: Vec<String>,
    pub stripe_webhook_secret: Option<String>,
    pub generation: GenerationSettings,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let defaults = GenerationSettings::default();
        let generation = GenerationSettings {
            rate_limit_per_window: parse_env("GENERATION_RATE_LIMIT")?
                .unwrap_or(defaults.rate_limit_per_window),
            request_deadline: parse_env::<u64>("GENERATION_DEADLINE_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_deadline),
            ..defaults
        };

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: optional_env("REDIS_URL"),
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            exa_api_key: optional_env("EXA_API_KEY"),
            stripe_allowed_price_ids: optional_env("STRIPE_ALLOWED_PRICE_IDS")
                .map(|raw| split_list(&raw))
                .unwrap_or_default(),
            stripe_webhook_secret: optional_env("STRIPE_WEBHOOK_SECRET"),
            generation,
            port: parse_env("PORT")?.unwrap_or(8080),
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Unset and blank values are both treated as absent.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_env<T>(key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    optional_env(key)
        .map(|raw| {
            raw.parse::<T>()
                .with_context(|| format!("Environment variable '{key}' has an invalid value"))
        })
        .transpose()
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
