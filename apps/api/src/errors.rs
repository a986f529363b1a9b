use std::any::Any;

use axum::{
    body::Body,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::generation::quota::LimitKind;

/// A single field that failed request validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        fields: Vec<FieldError>,
    },

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Quota exceeded ({limit})")]
    QuotaExceeded { limit: LimitKind, remaining: u32 },

    #[error("Upstream credits exhausted")]
    UpstreamCreditsExhausted,

    #[error("Quota check failed: {0}")]
    QuotaCheck(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Content parse error: {0}")]
    ContentParse(String),

    #[error("Schema validation error: {0}")]
    SchemaValidation(String),

    #[error("Request deadline exceeded")]
    DeadlineExceeded,

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(fields: Vec<FieldError>) -> Self {
        let message = fields
            .iter()
            .map(|f| format!("{}: {}", f.field, f.message))
            .collect::<Vec<_>>()
            .join("; ");
        AppError::Validation { message, fields }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::RateLimited { .. } | AppError::QuotaExceeded { .. } => {
                StatusCode::TOO_MANY_REQUESTS
            }
            AppError::UpstreamCreditsExhausted => StatusCode::PAYMENT_REQUIRED,
            AppError::QuotaCheck(_) | AppError::Llm(_) | AppError::DeadlineExceeded => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::ContentParse(_)
            | AppError::SchemaValidation(_)
            | AppError::Database(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> Value {
        match self {
            AppError::Validation { message, fields } => json!({
                "error": "VALIDATION_ERROR",
                "message": message,
                "fields": fields,
            }),
            AppError::Unauthorized => json!({
                "error": "UNAUTHORIZED",
                "message": "Sign in to generate ideas.",
            }),
            AppError::Forbidden(msg) => json!({
                "error": "FORBIDDEN",
                "message": msg,
            }),
            AppError::RateLimited { retry_after_secs } => json!({
                "error": "RATE_LIMITED",
                "message": format!(
                    "Too many requests. Please wait {retry_after_secs} seconds and try again."
                ),
                "retryAfter": retry_after_secs,
            }),
            AppError::QuotaExceeded { limit, remaining } => {
                let message = match limit {
                    LimitKind::Hourly => {
                        "You've reached your hourly idea limit. Wait an hour or upgrade to Premium for unlimited ideas."
                    }
                    LimitKind::Daily => {
                        "You've reached your daily idea limit. Come back tomorrow or upgrade to Premium for unlimited ideas."
                    }
                };
                json!({
                    "error": "QUOTA_EXCEEDED",
                    "message": message,
                    "remainingIdeas": remaining,
                    "limitType": limit,
                    "requiresUpgrade": true,
                })
            }
            AppError::UpstreamCreditsExhausted => json!({
                "error": "CREDITS_EXHAUSTED",
                "message": "Idea generation is temporarily unavailable on the free tier. Upgrade to continue.",
                "requiresUpgrade": true,
            }),
            AppError::QuotaCheck(msg) => {
                tracing::error!("Quota check failed: {msg}");
                json!({
                    "error": "QUOTA_CHECK_FAILED",
                    "message": "We couldn't verify your usage right now. Please try again in a moment.",
                })
            }
            AppError::Llm(msg) => {
                tracing::error!("LLM error: {msg}");
                json!({
                    "error": "GENERATION_UNAVAILABLE",
                    "message": "The idea generator is temporarily unavailable. Please try again shortly.",
                })
            }
            AppError::ContentParse(msg) | AppError::SchemaValidation(msg) => {
                tracing::error!("Malformed model output: {msg}");
                json!({
                    "error": "GENERATION_FAILED",
                    "message": "The generated idea was incomplete. Please try again.",
                })
            }
            AppError::MethodNotAllowed => json!({
                "error": "METHOD_NOT_ALLOWED",
                "message": "This endpoint only accepts POST requests.",
            }),
            AppError::DeadlineExceeded => json!({
                "error": "DEADLINE_EXCEEDED",
                "message": "Generating your idea took too long. Please try again.",
            }),
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                json!({
                    "error": "DATABASE_ERROR",
                    "message": "We couldn't save your idea. Please try again.",
                })
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                json!({
                    "error": "INTERNAL_ERROR",
                    "message": "An internal server error occurred",
                })
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}

/// Last-resort body used when a handler panics. Kept as a literal so that
/// rendering it cannot fail.
pub const PANIC_BODY: &str =
    r#"{"error":"INTERNAL_ERROR","message":"An unexpected error occurred. Please try again."}"#;

/// Handler for `tower_http::catch_panic::CatchPanicLayer`.
pub fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!("Handler panicked: {detail}");

    let mut response = Response::new(Body::from(PANIC_BODY));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/json"),
    );
    response
}
