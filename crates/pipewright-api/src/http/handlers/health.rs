//! Liveness endpoint.

use axum::Json;
use serde_json::{Value, json};

/// GET /health
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "pipewright",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
