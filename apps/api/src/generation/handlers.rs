//! Axum route handlers for the Generation API.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    Json,
};
use serde::Serialize;
use tracing::info;

use crate::auth::require_session;
use crate::errors::{AppError, FieldError};
use crate::generation::generator::generate_idea;
use crate::generation::quota::{evaluate_quota, QuotaStatus, Remaining, UsageClock};
use crate::generation::validation::GenerateIdeaPayload;
use crate::models::idea::GeneratedIdeaRow;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateIdeaResponse {
    pub success: bool,
    pub idea: GeneratedIdeaRow,
    pub remaining_ideas: Remaining,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/ideas/generate
///
/// Authenticates first, then runs the generation pipeline. A malformed body is
/// reported only to authenticated callers.
pub async fn handle_generate_idea(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<GenerateIdeaPayload>, JsonRejection>,
) -> Result<Json<GenerateIdeaResponse>, AppError> {
    let session = require_session(state.sessions.as_ref(), &headers).await?;

    let Json(payload) = payload.map_err(|rejection| {
        AppError::validation(vec![FieldError {
            field: "body",
            message: rejection.body_text(),
        }])
    })?;

    let outcome = generate_idea(&state, &session, payload).await?;

    info!(
        "Generated idea {} for {} ({:?} remaining)",
        outcome.idea.id, session.email, outcome.remaining
    );

    Ok(Json(GenerateIdeaResponse {
        success: true,
        idea: outcome.idea,
        remaining_ideas: outcome.remaining,
    }))
}

/// GET /api/v1/ideas/usage
///
/// Reports the caller's quota without generating anything.
pub async fn handle_usage(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<QuotaStatus>, AppError> {
    let session = require_session(state.sessions.as_ref(), &headers).await?;

    let status = evaluate_quota(
        state.ideas.as_ref(),
        state.subscriptions.as_ref(),
        &session.email.to_lowercase(),
        UsageClock::local_now(),
    )
    .await?;

    Ok(Json(status))
}

/// Any method other than POST on the generate route.
pub async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}
