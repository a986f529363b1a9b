use axum::Json;
use serde_json::{json, Value};

/// GET /health
/// Returns a simple status object with service version.
pub async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "ideaforge-api"
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_names_service() {
        let Json(body) = health_handler().await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "ideaforge-api");
    }
}
