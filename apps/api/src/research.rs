//! Market research: a thin client over the Exa neural search API.
//!
//! This dependency never fails a request. Missing credentials, non-success
//! responses, and timeouts all degrade to a static fallback snippet.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::retry::Backoff;

const EXA_SEARCH_URL: &str = "https://api.exa.ai/search";
const CALL_TIMEOUT: Duration = Duration::from_secs(8);
const MAX_ATTEMPTS: u32 = 2;
const BACKOFF: Backoff = Backoff::new(500, 2000, 2);
const NUM_RESULTS: u32 = 3;

/// One search hit, reduced to what the prompt needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchSnippet {
    pub title: String,
    pub summary: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    /// No API key configured (demo mode). No network I/O was attempted.
    Unconfigured,
    /// The API failed, returned nothing usable, or timed out.
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResearchSource {
    Live,
    Fallback(FallbackReason),
}

#[derive(Debug, Clone)]
pub struct ResearchOutcome {
    pub snippets: Vec<ResearchSnippet>,
    pub source: ResearchSource,
}

impl ResearchOutcome {
    pub fn fallback(reason: FallbackReason) -> Self {
        Self {
            snippets: vec![fallback_snippet()],
            source: ResearchSource::Fallback(reason),
        }
    }
}

/// The static entry returned whenever live research is unavailable.
pub fn fallback_snippet() -> ResearchSnippet {
    ResearchSnippet {
        title: "General startup market trends".to_string(),
        summary: "Demand keeps growing for AI-assisted productivity tools, vertical SaaS for \
                  underserved industries, and subscription services that save small businesses \
                  time or money."
            .to_string(),
    }
}

/// Carried in `AppState` as `Arc<dyn MarketResearch>`. Infallible by contract.
#[async_trait]
pub trait MarketResearch: Send + Sync {
    async fn search(&self, query: &str) -> ResearchOutcome;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest<'a> {
    query: &'a str,
    #[serde(rename = "type")]
    search_type: &'a str,
    num_results: u32,
    contents: SearchContents,
}

#[derive(Debug, Serialize)]
struct SearchContents {
    summary: bool,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    title: Option<String>,
    summary: Option<String>,
}

/// Why one search attempt produced nothing. Never leaves this module.
#[derive(Debug, Error)]
enum ResearchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("search API returned {0}")]
    Status(StatusCode),

    #[error("search API returned no usable results")]
    Empty,
}

#[derive(Clone)]
pub struct ExaClient {
    client: Client,
    api_key: Option<String>,
    endpoint: String,
}

impl ExaClient {
    pub fn new(api_key: Option<String>) -> Self {
        Self::with_endpoint(api_key, EXA_SEARCH_URL.to_string())
    }

    pub fn with_endpoint(api_key: Option<String>, endpoint: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            endpoint,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn try_search(
        &self,
        api_key: &str,
        query: &str,
    ) -> Result<Vec<ResearchSnippet>, ResearchError> {
        let body = SearchRequest {
            query,
            search_type: "neural",
            num_results: NUM_RESULTS,
            contents: SearchContents { summary: true },
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", api_key)
            .timeout(CALL_TIMEOUT)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResearchError::Status(status));
        }

        let parsed: SearchResponse = response.json().await?;

        let snippets: Vec<ResearchSnippet> = parsed
            .results
            .into_iter()
            .filter_map(|r| match (r.title, r.summary) {
                (Some(title), Some(summary)) if !title.trim().is_empty() => Some(ResearchSnippet {
                    title: title.trim().to_string(),
                    summary: summary.trim().to_string(),
                }),
                _ => None,
            })
            .collect();

        if snippets.is_empty() {
            return Err(ResearchError::Empty);
        }
        Ok(snippets)
    }
}

#[async_trait]
impl MarketResearch for ExaClient {
    async fn search(&self, query: &str) -> ResearchOutcome {
        let Some(api_key) = self.api_key.as_deref() else {
            debug!("No search API key configured; using fallback research");
            return ResearchOutcome::fallback(FallbackReason::Unconfigured);
        };

        for attempt in 1..=MAX_ATTEMPTS {
            if attempt > 1 {
                tokio::time::sleep(BACKOFF.delay(attempt - 1)).await;
            }

            match self.try_search(api_key, query).await {
                Ok(snippets) => {
                    info!("Market research returned {} results", snippets.len());
                    return ResearchOutcome {
                        snippets,
                        source: ResearchSource::Live,
                    };
                }
                Err(reason) => {
                    warn!("Market research attempt {attempt}/{MAX_ATTEMPTS} failed: {reason}");
                }
            }
        }

        ResearchOutcome::fallback(FallbackReason::Unavailable)
    }
}

/// Races a research call against `limit`; expiry resolves to the fallback.
pub async fn search_with_deadline(
    research: &dyn MarketResearch,
    query: &str,
    limit: Duration,
) -> ResearchOutcome {
    match tokio::time::timeout(limit, research.search(query)).await {
        Ok(outcome) => outcome,
        Err(_) => {
            warn!("Market research exceeded {}ms; using fallback", limit.as_millis());
            ResearchOutcome::fallback(FallbackReason::Unavailable)
        }
    }
}
