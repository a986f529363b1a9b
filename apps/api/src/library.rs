//! The caller's saved-idea library.
//!
//! Saved ideas reference generated ideas weakly: a pointer whose referent is
//! gone is still listed, with `idea: null`.

use std::collections::HashMap;

use axum::{extract::State, http::HeaderMap, Json};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::auth::require_session;
use crate::errors::AppError;
use crate::models::idea::{GeneratedIdeaRow, SavedIdeaRow};
use crate::state::AppState;
use crate::store::IdeaStore;

#[derive(Debug, Serialize)]
pub struct LibraryEntry {
    #[serde(flatten)]
    pub saved: SavedIdeaRow,
    pub idea: Option<GeneratedIdeaRow>,
}

#[derive(Debug, Serialize)]
pub struct LibraryResponse {
    pub ideas: Vec<LibraryEntry>,
}

/// Saved ideas newest first, each paired with its generated idea.
pub async fn load_library(
    store: &dyn IdeaStore,
    email: &str,
) -> Result<Vec<LibraryEntry>, AppError> {
    let saved = store.saved_ideas_for(email).await?;
    if saved.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<Uuid> = saved.iter().map(|s| s.idea_id).collect();
    let by_id: HashMap<Uuid, GeneratedIdeaRow> = store
        .ideas_by_ids(&ids)
        .await?
        .into_iter()
        .map(|idea| (idea.id, idea))
        .collect();

    debug!(
        "Library for {email}: {} saved, {} resolved",
        saved.len(),
        by_id.len()
    );

    Ok(saved
        .into_iter()
        .map(|saved| {
            let idea = by_id.get(&saved.idea_id).cloned();
            LibraryEntry { saved, idea }
        })
        .collect())
}

/// GET /api/v1/library
pub async fn handle_get_library(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<LibraryResponse>, AppError> {
    let session = require_session(state.sessions.as_ref(), &headers).await?;
    let ideas = load_library(state.ideas.as_ref(), &session.email.to_lowercase()).await?;
    Ok(Json(LibraryResponse { ideas }))
}
