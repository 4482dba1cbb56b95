//! HTTP handlers for stash-api.

pub mod import_logs;
pub mod items_io;
pub mod references;

use axum::Json;
use serde_json::{json, Value as JsonValue};

/// Liveness check.
pub async fn health() -> Json<JsonValue> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
