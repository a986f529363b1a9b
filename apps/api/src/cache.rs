//! Cache invalidation for downstream rendering layers.
//!
//! Renderers cache per-user views under `cache:{view}:{email}` and subscribe to
//! `cache:invalidate` for push notification. A failed signal is never fatal to
//! the caller; views simply stay stale until their TTL.

use async_trait::async_trait;
use redis::AsyncCommands;
use serde_json::json;
use tracing::debug;

/// Views that show generated ideas.
pub const IDEA_VIEWS: &[&str] = &["library", "dashboard"];

const INVALIDATION_CHANNEL: &str = "cache:invalidate";

#[async_trait]
pub trait CacheInvalidator: Send + Sync {
    async fn invalidate_user_views(&self, email: &str, views: &[&str]) -> anyhow::Result<()>;
}

pub fn cache_key(view: &str, email: &str) -> String {
    format!("cache:{view}:{email}")
}

pub struct RedisCacheInvalidator {
    client: redis::Client,
}

impl RedisCacheInvalidator {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CacheInvalidator for RedisCacheInvalidator {
    async fn invalidate_user_views(&self, email: &str, views: &[&str]) -> anyhow::Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let keys: Vec<String> = views.iter().map(|v| cache_key(v, email)).collect();
        conn.del::<_, ()>(&keys).await?;

        let payload = json!({ "email": email, "views": views }).to_string();
        conn.publish::<_, _, ()>(INVALIDATION_CHANNEL, payload).await?;

        debug!("Invalidated {} cached views for {email}", keys.len());
        Ok(())
    }
}

/// Used when no Redis is configured.
pub struct LogOnlyInvalidator;

#[async_trait]
impl CacheInvalidator for LogOnlyInvalidator {
    async fn invalidate_user_views(&self, email: &str, views: &[&str]) -> anyhow::Result<()> {
        debug!("Cache invalidation (no backend) for {email}: {views:?}");
        Ok(())
    }
}
