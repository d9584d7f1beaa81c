use std::sync::Arc;

use axum::{Extension, Json};
use serde_json::{json, Value as JsonValue};

use crate::app::SessionRegistry;
use crate::config::Config;

/// GET /health
pub async fn health_check(
    Extension(registry): Extension<Arc<SessionRegistry>>,
    Extension(config): Extension<Config>,
) -> Json<JsonValue> {
    let oracle = match config.gemini_api_key {
        Some(_) => "gemini",
        None => "offline",
    };
    Json(json!({
        "status": "ok",
        "sessions": registry.len().await,
        "oracle": oracle,
    }))
}
