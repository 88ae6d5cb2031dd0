//! Health endpoint

use axum::{response::Json, routing::get, Router};
use serde_json::json;

use crate::AppState;

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "service": "gasa",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
    }))
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
