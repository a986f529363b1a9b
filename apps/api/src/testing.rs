//! In-memory fakes for the `AppState` seams, shared by unit tests.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use sqlx::types::Json;
use uuid::Uuid;

use crate::auth::SessionProvider;
use crate::cache::CacheInvalidator;
use crate::llm_client::{ContentModel, LlmError};
use crate::models::idea::{
    GeneratedIdeaRow, NewGeneratedIdea, NewSavedIdea, SavedIdeaRow, ValidationData,
};
use crate::models::user::SessionIdentity;
use crate::rate_limit::InMemoryRateLimiter;
use crate::research::{MarketResearch, ResearchOutcome, ResearchSnippet, ResearchSource};
use crate::state::{AppState, GenerationSettings};
use crate::store::{IdeaStore, SubscriptionLookup};

pub const VALID_TOKEN: &str = "test-session-token";
pub const TEST_EMAIL: &str = "ada@example.com";

fn injected(what: &str) -> sqlx::Error {
    sqlx::Error::Protocol(format!("injected {what} failure"))
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// A complete, schema-valid idea object.
pub fn sample_idea_json(title: &str) -> Value {
    json!({
        "title": title,
        "problem": "Pet owners lose track of vaccinations and vet visits.",
        "solution": "A shared pet health calendar with automatic vet reminders.",
        "market_size": "$2B pet care software market",
        "target_audience": "Urban dog and cat owners aged 25-45",
        "revenue_streams": ["Monthly subscription", "Vet clinic partnerships"],
        "validation_data": {
            "market_trends": ["Pet ownership up 20% since 2020", "Vet costs rising"],
            "competitor_analysis": "Existing apps focus on pet social networks, not health.",
            "demand_indicators": ["Frequent forum questions about vaccine schedules"]
        }
    })
}

/// Model completion text carrying `sample_idea_json(title)`.
pub fn idea_completion(title: &str) -> String {
    sample_idea_json(title).to_string()
}

// ────────────────────────────────────────────────────────────────────────────
// Store
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryIdeaStore {
    pub ideas: Mutex<Vec<GeneratedIdeaRow>>,
    pub saved: Mutex<Vec<SavedIdeaRow>>,
    pub count_calls: AtomicUsize,
    pub fail_counts: bool,
    pub fail_idea_insert: bool,
    pub fail_saved_insert: bool,
    /// Stalls the saved-idea insert on tokio time before writing.
    pub saved_insert_delay: Option<Duration>,
}

impl MemoryIdeaStore {
    /// Inserts a generated idea with an explicit creation time.
    pub fn seed_idea(&self, email: &str, created_at: DateTime<Utc>) -> GeneratedIdeaRow {
        let content = sample_idea_json("Seeded idea");
        let validation_data: ValidationData =
            serde_json::from_value(content["validation_data"].clone()).unwrap();
        let row = GeneratedIdeaRow {
            id: Uuid::new_v4(),
            email: email.to_string(),
            title: "Seeded idea".to_string(),
            description: "Seeded description".to_string(),
            market_size: "$1B".to_string(),
            target_audience: "Everyone".to_string(),
            revenue_streams: vec!["Subscriptions".to_string()],
            validation_data: Json(validation_data),
            preferences: None,
            constraints: None,
            industry: None,
            created_at,
        };
        lock(&self.ideas).push(row.clone());
        row
    }

    pub fn seed_saved(&self, idea: &GeneratedIdeaRow, created_at: DateTime<Utc>) -> SavedIdeaRow {
        let row = SavedIdeaRow {
            id: Uuid::new_v4(),
            user_email: idea.email.clone(),
            idea_id: idea.id,
            title: idea.title.clone(),
            description: idea.description.clone(),
            is_liked: false,
            created_at,
        };
        lock(&self.saved).push(row.clone());
        row
    }

    pub fn ideas(&self) -> Vec<GeneratedIdeaRow> {
        lock(&self.ideas).clone()
    }

    pub fn saved(&self) -> Vec<SavedIdeaRow> {
        lock(&self.saved).clone()
    }

    pub fn count_calls(&self) -> usize {
        self.count_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdeaStore for MemoryIdeaStore {
    async fn count_ideas_since(
        &self,
        email: &str,
        since: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        self.count_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_counts {
            return Err(injected("count"));
        }
        let count = lock(&self.ideas)
            .iter()
            .filter(|i| i.email == email && i.created_at >= since)
            .count();
        Ok(count as i64)
    }

    async fn insert_generated_idea(
        &self,
        idea: NewGeneratedIdea,
    ) -> Result<GeneratedIdeaRow, sqlx::Error> {
        if self.fail_idea_insert {
            return Err(injected("idea insert"));
        }
        let row = GeneratedIdeaRow {
            id: Uuid::new_v4(),
            email: idea.email,
            title: idea.title,
            description: idea.description,
            market_size: idea.market_size,
            target_audience: idea.target_audience,
            revenue_streams: idea.revenue_streams,
            validation_data: Json(idea.validation_data),
            preferences: idea.preferences,
            constraints: idea.constraints,
            industry: idea.industry,
            created_at: Utc::now(),
        };
        lock(&self.ideas).push(row.clone());
        Ok(row)
    }

    async fn insert_saved_idea(&self, saved: NewSavedIdea) -> Result<SavedIdeaRow, sqlx::Error> {
        if let Some(delay) = self.saved_insert_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_saved_insert {
            return Err(injected("saved insert"));
        }
        let row = SavedIdeaRow {
            id: Uuid::new_v4(),
            user_email: saved.user_email,
            idea_id: saved.idea_id,
            title: saved.title,
            description: saved.description,
            is_liked: false,
            created_at: Utc::now(),
        };
        lock(&self.saved).push(row.clone());
        Ok(row)
    }

    async fn saved_ideas_for(&self, email: &str) -> Result<Vec<SavedIdeaRow>, sqlx::Error> {
        let mut rows: Vec<SavedIdeaRow> = lock(&self.saved)
            .iter()
            .filter(|s| s.user_email == email)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn ideas_by_ids(&self, ids: &[Uuid]) -> Result<Vec<GeneratedIdeaRow>, sqlx::Error> {
        Ok(lock(&self.ideas)
            .iter()
            .filter(|i| ids.contains(&i.id))
            .cloned()
            .collect())
    }
}

pub struct StaticSubscriptions {
    active: Result<bool, ()>,
}

impl StaticSubscriptions {
    pub fn free() -> Self {
        Self { active: Ok(false) }
    }

    pub fn premium() -> Self {
        Self { active: Ok(true) }
    }

    pub fn failing() -> Self {
        Self { active: Err(()) }
    }
}

#[async_trait]
impl SubscriptionLookup for StaticSubscriptions {
    async fn has_active_subscription(&self, _email: &str) -> Result<bool, sqlx::Error> {
        self.active.map_err(|_| injected("subscription lookup"))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// External collaborators
// ────────────────────────────────────────────────────────────────────────────

/// Knows exactly one token.
pub struct StaticSessions {
    identity: SessionIdentity,
}

#[async_trait]
impl SessionProvider for StaticSessions {
    async fn resolve(&self, token: &str) -> Result<Option<SessionIdentity>, sqlx::Error> {
        Ok((token == VALID_TOKEN).then(|| self.identity.clone()))
    }
}

/// Replays queued results, then answers with a valid idea.
pub struct ScriptedModel {
    script: Mutex<VecDeque<Result<String, LlmError>>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedModel {
    pub fn new(script: Vec<Result<String, LlmError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Sleeps on tokio time before every answer.
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new(Vec::new())
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentModel for ScriptedModel {
    async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = lock(&self.script).pop_front();
        next.unwrap_or_else(|| Ok(idea_completion("Generated idea")))
    }
}

pub struct StaticResearch {
    outcome: ResearchOutcome,
    calls: AtomicUsize,
}

impl StaticResearch {
    pub fn new(outcome: ResearchOutcome) -> Self {
        Self {
            outcome,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn live() -> Self {
        Self::new(ResearchOutcome {
            snippets: vec![ResearchSnippet {
                title: "Pet tech funding hits record".to_string(),
                summary: "Investors poured money into pet health startups this year.".to_string(),
            }],
            source: ResearchSource::Live,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MarketResearch for StaticResearch {
    async fn search(&self, _query: &str) -> ResearchOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}

/// Records each invalidation as `"{email}:{view,view}"`.
#[derive(Default)]
pub struct RecordingCache {
    calls: Mutex<Vec<String>>,
    failing: AtomicBool,
    stall: Mutex<Option<Duration>>,
}

impl RecordingCache {
    pub fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    /// Makes every later call sleep on tokio time before answering.
    pub fn stall(&self, delay: Duration) {
        *lock(&self.stall) = Some(delay);
    }

    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl CacheInvalidator for RecordingCache {
    async fn invalidate_user_views(&self, email: &str, views: &[&str]) -> anyhow::Result<()> {
        let stall = *lock(&self.stall);
        if let Some(delay) = stall {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("cache backend unreachable");
        }
        lock(&self.calls).push(format!("{email}:{}", views.join(",")));
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Stub upstream
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
struct StubScript {
    responses: Arc<Mutex<VecDeque<(u16, String)>>>,
    hits: Arc<AtomicUsize>,
}

/// A local HTTP server answering POST `path` with scripted `(status, body)`
/// pairs in order, then with `500 {}` once the script runs out.
pub struct StubServer {
    addr: SocketAddr,
    hits: Arc<AtomicUsize>,
}

impl StubServer {
    pub async fn start(path: &'static str, script: Vec<(u16, String)>) -> Self {
        let script = StubScript {
            responses: Arc::new(Mutex::new(script.into())),
            hits: Arc::new(AtomicUsize::new(0)),
        };
        let hits = script.hits.clone();
        let app = Router::new()
            .route(path, post(stub_reply))
            .with_state(script);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self { addr, hits }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

async fn stub_reply(State(script): State<StubScript>) -> Response {
    script.hits.fetch_add(1, Ordering::SeqCst);
    let (status, body) = lock(&script.responses)
        .pop_front()
        .unwrap_or((500, "{}".to_string()));
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
}

// ────────────────────────────────────────────────────────────────────────────
// Harness
// ────────────────────────────────────────────────────────────────────────────

/// A fully wired `AppState` over fakes, with handles kept for assertions.
pub struct TestHarness {
    pub state: AppState,
    pub session: SessionIdentity,
    pub store: Arc<MemoryIdeaStore>,
    pub research: Arc<StaticResearch>,
    pub model: Arc<ScriptedModel>,
    pub cache: Arc<RecordingCache>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::wire(MemoryIdeaStore::default())
    }

    pub fn with_store(store: MemoryIdeaStore) -> Self {
        Self::wire(store)
    }

    pub fn with_store_faults(fail_idea_insert: bool, fail_saved_insert: bool) -> Self {
        Self::with_store(MemoryIdeaStore {
            fail_idea_insert,
            fail_saved_insert,
            ..Default::default()
        })
    }

    fn wire(store: MemoryIdeaStore) -> Self {
        let session = SessionIdentity {
            user_id: Uuid::new_v4(),
            email: TEST_EMAIL.to_string(),
        };
        let store = Arc::new(store);
        let research = Arc::new(StaticResearch::live());
        let model = Arc::new(ScriptedModel::new(Vec::new()));
        let cache = Arc::new(RecordingCache::default());

        let state = AppState {
            ideas: store.clone(),
            subscriptions: Arc::new(StaticSubscriptions::free()),
            sessions: Arc::new(StaticSessions {
                identity: session.clone(),
            }),
            rate_limiter: Arc::new(InMemoryRateLimiter::new()),
            research: research.clone(),
            model: model.clone(),
            cache: cache.clone(),
            settings: GenerationSettings::default(),
        };

        Self {
            state,
            session,
            store,
            research,
            model,
            cache,
        }
    }
}
