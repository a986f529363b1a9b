// Idea generation: request validation, quota, content generation with JSON
// recovery, schema check, and persistence.
// All model calls go through llm_client; no direct HTTP calls here.

pub mod generator;
pub mod handlers;
pub mod json_recovery;
pub mod persistence;
pub mod prompts;
pub mod quota;
pub mod schema;
pub mod validation;
