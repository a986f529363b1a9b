use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::idea::{GeneratedIdeaRow, NewGeneratedIdea, NewSavedIdea, SavedIdeaRow};
use crate::store::{IdeaStore, SubscriptionLookup};

#[derive(Clone)]
pub struct PgIdeaStore {
    pool: PgPool,
}

impl PgIdeaStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdeaStore for PgIdeaStore {
    async fn count_ideas_since(
        &self,
        email: &str,
        since: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM generated_ideas WHERE email = $1 AND created_at >= $2",
        )
        .bind(email)
        .bind(since)
        .fetch_one(&self.pool)
        .await
    }

    async fn insert_generated_idea(
        &self,
        idea: NewGeneratedIdea,
    ) -> Result<GeneratedIdeaRow, sqlx::Error> {
        sqlx::query_as::<_, GeneratedIdeaRow>(
            r#"
            INSERT INTO generated_ideas
                (id, email, title, description, market_size, target_audience,
                 revenue_streams, validation_data, preferences, constraints, industry)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&idea.email)
        .bind(&idea.title)
        .bind(&idea.description)
        .bind(&idea.market_size)
        .bind(&idea.target_audience)
        .bind(&idea.revenue_streams)
        .bind(Json(&idea.validation_data))
        .bind(&idea.preferences)
        .bind(&idea.constraints)
        .bind(&idea.industry)
        .fetch_one(&self.pool)
        .await
    }

    async fn insert_saved_idea(&self, saved: NewSavedIdea) -> Result<SavedIdeaRow, sqlx::Error> {
        sqlx::query_as::<_, SavedIdeaRow>(
            r#"
            INSERT INTO saved_ideas (id, user_email, idea_id, title, description)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&saved.user_email)
        .bind(saved.idea_id)
        .bind(&saved.title)
        .bind(&saved.description)
        .fetch_one(&self.pool)
        .await
    }

    async fn saved_ideas_for(&self, email: &str) -> Result<Vec<SavedIdeaRow>, sqlx::Error> {
        sqlx::query_as::<_, SavedIdeaRow>(
            "SELECT * FROM saved_ideas WHERE user_email = $1 ORDER BY created_at DESC",
        )
        .bind(email)
        .fetch_all(&self.pool)
        .await
    }

    async fn ideas_by_ids(&self, ids: &[Uuid]) -> Result<Vec<GeneratedIdeaRow>, sqlx::Error> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_as::<_, GeneratedIdeaRow>("SELECT * FROM generated_ideas WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await
    }
}

#[derive(Clone)]
pub struct PgSubscriptionLookup {
    pool: PgPool,
}

impl PgSubscriptionLookup {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriptionLookup for PgSubscriptionLookup {
    async fn has_active_subscription(&self, email: &str) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM subscriptions
                WHERE user_email = $1
                  AND status IN ('active', 'trialing')
                  AND (current_period_end IS NULL OR current_period_end > now())
            )
            "#,
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
    }
}
