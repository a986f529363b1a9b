//! Persistence seams. The generation pipeline talks to these traits; the
//! Postgres implementations live in `postgres.rs`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::idea::{GeneratedIdeaRow, NewGeneratedIdea, NewSavedIdea, SavedIdeaRow};

pub mod postgres;

pub use postgres::{PgIdeaStore, PgSubscriptionLookup};

#[async_trait]
pub trait IdeaStore: Send + Sync {
    /// Number of generated ideas for `email` with `created_at >= since`.
    async fn count_ideas_since(&self, email: &str, since: DateTime<Utc>)
        -> Result<i64, sqlx::Error>;

    async fn insert_generated_idea(
        &self,
        idea: NewGeneratedIdea,
    ) -> Result<GeneratedIdeaRow, sqlx::Error>;

    async fn insert_saved_idea(&self, saved: NewSavedIdea) -> Result<SavedIdeaRow, sqlx::Error>;

    /// Saved ideas for `email`, newest first.
    async fn saved_ideas_for(&self, email: &str) -> Result<Vec<SavedIdeaRow>, sqlx::Error>;

    async fn ideas_by_ids(&self, ids: &[Uuid]) -> Result<Vec<GeneratedIdeaRow>, sqlx::Error>;
}

/// Read-only view of the billing provider's subscription mirror.
#[async_trait]
pub trait SubscriptionLookup: Send + Sync {
    async fn has_active_subscription(&self, email: &str) -> Result<bool, sqlx::Error>;
}
