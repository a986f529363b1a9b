//! LLM Client: the single point of entry for all generation-model calls.
//!
//! No other module may call the Anthropic API directly. The generation
//! pipeline depends on the `ContentModel` trait, which `LlmClient` implements.
//!
//! Model: claude-sonnet-4-5 (hardcoded, not configurable)
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::retry::Backoff;

pub mod prompts;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
/// The model used for all idea generation calls.
pub const MODEL: &str = "claude-sonnet-4-5";
/// Ideas are a single small JSON object; keep completions short.
const MAX_TOKENS: u32 = 1200;
/// One call plus one retry.
const MAX_ATTEMPTS: u32 = 2;
const BACKOFF: Backoff = Backoff::new(1000, 8000, 2);

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited by the generation API")]
    RateLimited,

    #[error("Generation API credits exhausted")]
    CreditsExhausted,

    #[error("LLM returned empty content")]
    EmptyContent,
}

/// Anything that can turn a prompt into raw completion text.
///
/// Carried in `AppState` as `Arc<dyn ContentModel>`.
#[async_trait]
pub trait ContentModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct LlmResponse {
    pub content: Vec<ContentBlock>,
    pub usage: Usage,
}

#[derive(Debug, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl LlmResponse {
    /// Extracts the text content from the first non-empty text block.
    pub fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .filter(|b| b.block_type == "text")
            .filter_map(|b| b.text.as_deref())
            .find(|t| !t.trim().is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

/// How a non-success response from the generation API should be handled.
#[derive(Debug, PartialEq, Eq)]
enum Failure {
    /// Abort immediately; retrying cannot help.
    RateLimited,
    CreditsExhausted,
    /// Worth one more attempt.
    Transient,
    /// Client error; return as-is.
    Fatal,
}

fn classify_failure(status: StatusCode, body: &str) -> Failure {
    let lowered = body.to_lowercase();

    if status == StatusCode::TOO_MANY_REQUESTS
        || lowered.contains("rate limit")
        || lowered.contains("rate_limit")
    {
        return Failure::RateLimited;
    }

    if status == StatusCode::PAYMENT_REQUIRED
        || lowered.contains("credit balance")
        || lowered.contains("insufficient_quota")
        || lowered.contains("insufficient credits")
    {
        return Failure::CreditsExhausted;
    }

    if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
        Failure::Transient
    } else {
        Failure::Fatal
    }
}

/// The generation-model client. Wraps the Anthropic Messages API with a
/// bounded retry that fails fast on rate limiting.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    endpoint: String,
}

impl LlmClient {
    pub fn new(api_key: String) -> Result<Self, LlmError> {
        Self::with_endpoint(api_key, ANTHROPIC_API_URL.to_string())
    }

    pub fn with_endpoint(api_key: String, endpoint: String) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder()
                .timeout(Duration::from_secs(60))
                .build()?,
            api_key,
            endpoint,
        })
    }

    /// Makes a raw call to the Messages API, returning the full response object.
    /// Retries once on transport errors, 5xx and empty completions. A rate-limit
    /// or credit-exhaustion signal ends the loop without using the retry.
    pub async fn call(&self, prompt: &str) -> Result<LlmResponse, LlmError> {
        let request_body = AnthropicRequest {
            model: MODEL,
            max_tokens: MAX_TOKENS,
            messages: vec![AnthropicMessage {
                role: "user",
                content: prompt,
            }],
        };

        let mut last_error: Option<LlmError> = None;

        for attempt in 1..=MAX_ATTEMPTS {
            if attempt > 1 {
                let delay = BACKOFF.delay(attempt - 1);
                warn!(
                    "LLM call attempt {} failed, retrying after {}ms...",
                    attempt - 1,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(&self.endpoint)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("content-type", "application/json")
                .json(&request_body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<AnthropicError>(&body)
                    .map(|e| e.error.message)
                    .unwrap_or(body);

                match classify_failure(status, &message) {
                    Failure::RateLimited => {
                        warn!("LLM API rate limited ({status}); not retrying");
                        return Err(LlmError::RateLimited);
                    }
                    Failure::CreditsExhausted => {
                        warn!("LLM API credits exhausted ({status})");
                        return Err(LlmError::CreditsExhausted);
                    }
                    Failure::Transient => {
                        warn!("LLM API returned {}: {}", status, message);
                        last_error = Some(LlmError::Api {
                            status: status.as_u16(),
                            message,
                        });
                        continue;
                    }
                    Failure::Fatal => {
                        return Err(LlmError::Api {
                            status: status.as_u16(),
                            message,
                        });
                    }
                }
            }

            let llm_response: LlmResponse = match response.json().await {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            if llm_response.text().is_none() {
                last_error = Some(LlmError::EmptyContent);
                continue;
            }

            debug!(
                "LLM call succeeded: input_tokens={}, output_tokens={}",
                llm_response.usage.input_tokens, llm_response.usage.output_tokens
            );

            return Ok(llm_response);
        }

        Err(last_error.unwrap_or(LlmError::EmptyContent))
    }
}

#[async_trait]
impl ContentModel for LlmClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let response = self.call(prompt).await?;
        response
            .text()
            .map(str::to_string)
            .ok_or(LlmError::EmptyContent)
    }
}
