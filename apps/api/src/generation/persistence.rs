//! Writes a generated idea and its library pointer.
//!
//! The two inserts are independent commits. The generated idea is the
//! canonical record; the saved-idea pointer is best effort and a failure or
//! stall there is logged for later reconciliation, never surfaced.

use std::time::Duration;

use tracing::{info, warn};

use crate::errors::AppError;
use crate::generation::schema::IdeaContent;
use crate::generation::validation::GenerationRequest;
use crate::models::idea::{GeneratedIdeaRow, NewGeneratedIdea, NewSavedIdea};
use crate::store::IdeaStore;

/// Bound on the best-effort library pointer write.
const POINTER_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn persist_idea(
    store: &dyn IdeaStore,
    request: &GenerationRequest,
    content: IdeaContent,
) -> Result<GeneratedIdeaRow, AppError> {
    let new_idea = NewGeneratedIdea {
        email: request.email.clone(),
        title: content.title,
        description: content.solution,
        market_size: content.market_size,
        target_audience: content.target_audience,
        revenue_streams: content.revenue_streams,
        validation_data: content.validation_data,
        preferences: request.preferences.clone(),
        constraints: request.constraints.clone(),
        industry: request.industry.clone(),
    };

    let idea = store.insert_generated_idea(new_idea).await?;
    info!("Stored generated idea {} for {}", idea.id, idea.email);

    let pointer = tokio::time::timeout(
        POINTER_WRITE_TIMEOUT,
        store.insert_saved_idea(NewSavedIdea::pointing_at(&idea)),
    )
    .await;

    match pointer {
        Ok(Ok(saved)) => info!("Added idea {} to library as {}", idea.id, saved.id),
        Ok(Err(e)) => warn!(
            idea_id = %idea.id,
            email = %idea.email,
            error = %e,
            "Library pointer write failed; idea kept, pointer needs reconciliation"
        ),
        Err(_) => warn!(
            idea_id = %idea.id,
            email = %idea.email,
            timeout_ms = POINTER_WRITE_TIMEOUT.as_millis() as u64,
            "Library pointer write timed out; idea kept, pointer needs reconciliation"
        ),
    }

    Ok(idea)
}
