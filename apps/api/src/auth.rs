//! Session lookup. Sign-up and sign-in belong to the auth provider; this
//! service only resolves an existing session token to a verified identity.

use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use sqlx::PgPool;
use tracing::error;

use crate::errors::AppError;
use crate::models::user::SessionIdentity;

const SESSION_COOKIE: &str = "session";

#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Resolves a session token. `Ok(None)` for unknown or expired tokens.
    async fn resolve(&self, token: &str) -> Result<Option<SessionIdentity>, sqlx::Error>;
}

#[derive(Clone)]
pub struct PgSessionProvider {
    pool: PgPool,
}

impl PgSessionProvider {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionProvider for PgSessionProvider {
    async fn resolve(&self, token: &str) -> Result<Option<SessionIdentity>, sqlx::Error> {
        sqlx::query_as::<_, SessionIdentity>(
            r#"
            SELECT u.id AS user_id, u.email
            FROM sessions s
            JOIN users u ON u.id = s.user_id
            WHERE s.token = $1 AND s.expires_at > now()
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
    }
}

/// Pulls the session token from `Authorization: Bearer` or the `session` cookie.
pub fn session_token(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());

    bearer.or_else(|| {
        headers
            .get(header::COOKIE)
            .and_then(|v| v.to_str().ok())?
            .split(';')
            .find_map(|c| {
                c.trim()
                    .strip_prefix(SESSION_COOKIE)
                    .and_then(|rest| rest.strip_prefix('='))
            })
            .filter(|t| !t.is_empty())
    })
}

/// Resolves the caller's identity or fails with 401.
pub async fn require_session(
    sessions: &dyn SessionProvider,
    headers: &HeaderMap,
) -> Result<SessionIdentity, AppError> {
    let token = session_token(headers).ok_or(AppError::Unauthorized)?;

    match sessions.resolve(token).await {
        Ok(Some(identity)) => Ok(identity),
        Ok(None) => Err(AppError::Unauthorized),
        Err(e) => {
            error!("Failed to validate session: {e}");
            Err(AppError::Unauthorized)
        }
    }
}
