//! Request validation and free-text sanitizing for idea generation.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::errors::{AppError, FieldError};
use crate::models::user::SessionIdentity;

const MAX_EMAIL_LEN: usize = 254;
const MAX_LONG_TEXT: usize = 1000;
const MAX_SHORT_TEXT: usize = 100;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9](?:[A-Za-z0-9\-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9\-]*[A-Za-z0-9])?)*\.[A-Za-z]{2,}$")
        .expect("email pattern is valid")
});

static SCRIPT_OR_STYLE_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>|<style\b[^>]*>.*?</style\s*>")
        .expect("script block pattern is valid")
});

static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)</?[A-Za-z!][^>]*>").expect("tag pattern is valid"));

// An opening bracket that still starts a tag after complete tags are gone.
static DANGLING_TAG_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(/?[A-Za-z!])").expect("dangling tag pattern is valid"));

static JS_URI: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)javascript\s*:").expect("js uri pattern is valid"));

/// Raw JSON body of `POST /api/v1/ideas/generate`. Every field is optional at
/// this layer so missing values surface as field errors, not parse failures.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateIdeaPayload {
    pub email: Option<String>,
    pub preferences: Option<String>,
    pub constraints: Option<String>,
    pub industry: Option<String>,
    pub budget: Option<String>,
    pub difficulty_level: Option<String>,
}

/// A validated, sanitized generation request owned by the session user.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub email: String,
    pub preferences: Option<String>,
    pub constraints: Option<String>,
    pub industry: Option<String>,
    pub budget: Option<String>,
    pub difficulty_level: Option<String>,
}

/// Validates field shapes, then checks the body email against the session.
/// Pure: no I/O happens here, so a mismatch has no side effects.
pub fn validate_request(
    payload: GenerateIdeaPayload,
    session: &SessionIdentity,
) -> Result<GenerationRequest, AppError> {
    let mut errors = Vec::new();

    let email = payload.email.as_deref().map(str::trim).unwrap_or_default();
    if email.is_empty() {
        errors.push(field_error("email", "is required"));
    } else if email.len() > MAX_EMAIL_LEN {
        errors.push(field_error(
            "email",
            &format!("must be at most {MAX_EMAIL_LEN} characters"),
        ));
    } else if !EMAIL_PATTERN.is_match(email) {
        errors.push(field_error("email", "must be a valid email address"));
    }

    let limits: [(&'static str, &Option<String>, usize); 5] = [
        ("preferences", &payload.preferences, MAX_LONG_TEXT),
        ("constraints", &payload.constraints, MAX_LONG_TEXT),
        ("industry", &payload.industry, MAX_SHORT_TEXT),
        ("budget", &payload.budget, MAX_SHORT_TEXT),
        ("difficultyLevel", &payload.difficulty_level, MAX_SHORT_TEXT),
    ];
    for (field, value, max) in limits {
        if value.as_deref().is_some_and(|v| v.chars().count() > max) {
            errors.push(field_error(
                field,
                &format!("must be at most {max} characters"),
            ));
        }
    }

    if !errors.is_empty() {
        return Err(AppError::validation(errors));
    }

    if !email.eq_ignore_ascii_case(session.email.trim()) {
        return Err(AppError::Forbidden(
            "You can only generate ideas for your own account.".to_string(),
        ));
    }

    Ok(GenerationRequest {
        email: email.to_lowercase(),
        preferences: sanitize_optional(payload.preferences),
        constraints: sanitize_optional(payload.constraints),
        industry: sanitize_optional(payload.industry),
        budget: sanitize_optional(payload.budget),
        difficulty_level: sanitize_optional(payload.difficulty_level),
    })
}

/// Strips markup from user text before it reaches a prompt or the database.
pub fn sanitize_text(input: &str) -> String {
    let without_blocks = SCRIPT_OR_STYLE_BLOCK.replace_all(input, "");
    let without_tags = HTML_TAG.replace_all(&without_blocks, "");
    let without_dangling = DANGLING_TAG_OPEN.replace_all(&without_tags, "$1");
    let without_js = JS_URI.replace_all(&without_dangling, "");
    without_js.trim().to_string()
}

fn sanitize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| sanitize_text(&v))
        .filter(|v| !v.is_empty())
}

fn field_error(field: &'static str, message: &str) -> FieldError {
    FieldError {
        field,
        message: message.to_string(),
    }
}
