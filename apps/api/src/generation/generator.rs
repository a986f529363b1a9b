//! Idea generation: orchestrates the full pipeline.
//!
//! Flow: validate → rate limit → quota → market research (or fallback) →
//!       LLM generate → JSON recovery → schema check (all under the request
//!       deadline) → persist → invalidate cached views → respond.

use std::time::Duration;

use serde_json::Value;
use tracing::{info, warn};

use crate::cache::IDEA_VIEWS;
use crate::errors::AppError;
use crate::generation::json_recovery::recover_json;
use crate::generation::persistence::persist_idea;
use crate::generation::prompts::{IDEA_PROMPT_TEMPLATE, NOT_SPECIFIED};
use crate::generation::quota::{evaluate_quota, Remaining, UsageClock};
use crate::generation::schema::{validate_idea, IdeaContent};
use crate::generation::validation::{validate_request, GenerateIdeaPayload, GenerationRequest};
use crate::llm_client::prompts::JSON_ONLY_INSTRUCTION;
use crate::llm_client::{ContentModel, LlmError};
use crate::models::idea::GeneratedIdeaRow;
use crate::models::user::SessionIdentity;
use crate::research::{search_with_deadline, ResearchSnippet};
use crate::state::AppState;

pub const GENERATE_OPERATION: &str = "generate_idea";

/// Research snippets passed to the prompt.
const MAX_SNIPPETS: usize = 2;
const SNIPPET_TITLE_CHARS: usize = 80;
const SNIPPET_SUMMARY_CHARS: usize = 150;
const PREFERENCES_CHARS: usize = 80;
const CONSTRAINTS_CHARS: usize = 80;
const SHORT_INPUT_CHARS: usize = 40;

/// Retry hint when the generation API itself is rate limiting us.
const UPSTREAM_RETRY_AFTER_SECS: u64 = 60;

/// Bound on the post-commit cache signal.
const CACHE_SIGNAL_TIMEOUT: Duration = Duration::from_secs(3);

// ────────────────────────────────────────────────────────────────────────────
// Data models
// ────────────────────────────────────────────────────────────────────────────

/// Result of one successful pipeline run.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub idea: GeneratedIdeaRow,
    /// Quota left after this generation.
    pub remaining: Remaining,
}

// ────────────────────────────────────────────────────────────────────────────
// Generation pipeline
// ────────────────────────────────────────────────────────────────────────────

/// Runs the generation pipeline for an authenticated caller.
///
/// Validation and the email ownership check happen before any I/O, so a
/// rejected request leaves no trace in the rate limiter, store or model.
/// The request deadline bounds everything up to the schema check. Once the
/// idea is committed the caller always gets it back; the library pointer and
/// the cache signal carry their own short bounds and only ever warn.
pub async fn generate_idea(
    state: &AppState,
    session: &SessionIdentity,
    payload: GenerateIdeaPayload,
) -> Result<GenerationOutcome, AppError> {
    let deadline = state.settings.request_deadline;
    let (request, content, remaining) =
        tokio::time::timeout(deadline, draft_idea(state, session, payload))
            .await
            .map_err(|_| {
                warn!(
                    user_id = %session.user_id,
                    deadline_secs = deadline.as_secs(),
                    "Idea generation exceeded the request deadline"
                );
                AppError::DeadlineExceeded
            })??;

    // Step 7: Persist idea, then library pointer
    let idea = persist_idea(state.ideas.as_ref(), &request, content).await?;

    // Step 8: Invalidate cached views, never fatal
    match tokio::time::timeout(
        CACHE_SIGNAL_TIMEOUT,
        state.cache.invalidate_user_views(&request.email, IDEA_VIEWS),
    )
    .await
    {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Cache invalidation failed for {}: {e:#}", request.email),
        Err(_) => warn!(
            "Cache invalidation for {} timed out after {}ms",
            request.email,
            CACHE_SIGNAL_TIMEOUT.as_millis()
        ),
    }

    Ok(GenerationOutcome { idea, remaining })
}

/// Steps 1 to 6: everything before the first write.
async fn draft_idea(
    state: &AppState,
    session: &SessionIdentity,
    payload: GenerateIdeaPayload,
) -> Result<(GenerationRequest, IdeaContent, Remaining), AppError> {
    // Step 1: Validate and sanitize
    let request = validate_request(payload, session)?;

    // Step 2: Per-user rate limit
    state
        .rate_limiter
        .check(
            GENERATE_OPERATION,
            &session.user_id.to_string(),
            state.settings.rate_limit_per_window,
            state.settings.rate_limit_window,
        )
        .await
        .map_err(|e| AppError::RateLimited {
            retry_after_secs: e.retry_after_secs,
        })?;

    // Step 3: Quota
    let quota = evaluate_quota(
        state.ideas.as_ref(),
        state.subscriptions.as_ref(),
        &request.email,
        UsageClock::local_now(),
    )
    .await?
    .ensure_can_generate()?;

    // Step 4: Market research, never fatal
    let research = search_with_deadline(
        state.research.as_ref(),
        &research_query(&request),
        state.settings.research_timeout,
    )
    .await;
    info!(
        "Research for {}: {:?}, {} snippets",
        request.email,
        research.source,
        research.snippets.len()
    );

    // Step 5: Generate and recover JSON
    let raw = generate_idea_content(state.model.as_ref(), &research.snippets, &request).await?;

    // Step 6: Schema check
    let content = validate_idea(raw)?;

    Ok((request, content, quota.remaining.after_use()))
}

// ────────────────────────────────────────────────────────────────────────────
// Content generation
// ────────────────────────────────────────────────────────────────────────────

/// Calls the model once (its client owns the retry) and recovers a JSON object
/// from the completion. The object is returned unvalidated.
pub async fn generate_idea_content(
    model: &dyn ContentModel,
    snippets: &[ResearchSnippet],
    request: &GenerationRequest,
) -> Result<Value, AppError> {
    let prompt = build_idea_prompt(snippets, request);

    let completion = model.complete(&prompt).await.map_err(|e| match e {
        LlmError::RateLimited => AppError::RateLimited {
            retry_after_secs: UPSTREAM_RETRY_AFTER_SECS,
        },
        LlmError::CreditsExhausted => AppError::UpstreamCreditsExhausted,
        other => AppError::Llm(format!("Idea generation call failed: {other}")),
    })?;

    recover_json(&completion).map_err(|e| AppError::ContentParse(e.to_string()))
}

/// Search query derived from the founder's inputs.
pub fn research_query(request: &GenerationRequest) -> String {
    let focus = [&request.industry, &request.preferences]
        .into_iter()
        .flatten()
        .map(|s| truncate_chars(s, PREFERENCES_CHARS))
        .collect::<Vec<_>>()
        .join(" ");

    if focus.is_empty() {
        "emerging startup opportunities and market trends".to_string()
    } else {
        format!("{focus} startup opportunities and market trends")
    }
}

/// Fills the prompt template. Every input is truncated to keep the prompt small.
pub fn build_idea_prompt(snippets: &[ResearchSnippet], request: &GenerationRequest) -> String {
    let research = snippets
        .iter()
        .take(MAX_SNIPPETS)
        .map(|s| {
            format!(
                "- {}: {}",
                truncate_chars(&s.title, SNIPPET_TITLE_CHARS),
                truncate_chars(&s.summary, SNIPPET_SUMMARY_CHARS)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let input = |value: &Option<String>, max: usize| {
        value
            .as_deref()
            .map(|v| truncate_chars(v, max))
            .unwrap_or_else(|| NOT_SPECIFIED.to_string())
    };

    IDEA_PROMPT_TEMPLATE
        .replace("{preferences}", &input(&request.preferences, PREFERENCES_CHARS))
        .replace("{constraints}", &input(&request.constraints, CONSTRAINTS_CHARS))
        .replace("{industry}", &input(&request.industry, SHORT_INPUT_CHARS))
        .replace("{budget}", &input(&request.budget, SHORT_INPUT_CHARS))
        .replace("{difficulty}", &input(&request.difficulty_level, SHORT_INPUT_CHARS))
        .replace("{research}", &research)
        .replace("{json_only_instruction}", JSON_ONLY_INSTRUCTION)
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.trim().chars().take(max).collect()
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
