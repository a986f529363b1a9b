pub mod health;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::catch_panic::CatchPanicLayer;

use crate::errors::panic_response;
use crate::generation::handlers;
use crate::library::handle_get_library;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Idea API
        .route(
            "/api/v1/ideas/generate",
            post(handlers::handle_generate_idea).fallback(handlers::method_not_allowed),
        )
        .route("/api/v1/ideas/usage", get(handlers::handle_usage))
        // Library API
        .route("/api/v1/library", get(handle_get_library))
        .layer(CatchPanicLayer::custom(panic_response))
        .with_state(state)
}
