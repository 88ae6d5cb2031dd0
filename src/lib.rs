//! gasa - lyric-first song discovery service
//!
//! Curates a personalized playlist by alternating LLM-generated,
//! lyric-focused recommendation rounds with user selections. Each round is a
//! small state machine (`pending → ready | failed → consumed`) whose
//! generation fans out to a text-generation call plus two best-effort web
//! lookups per candidate.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use error::{ApiError, ApiResult};

use std::sync::Arc;

use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use services::{EnrichmentGateway, LlmClient};

/// Application state shared across handlers and background tasks
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Text-generation client
    pub llm: Arc<LlmClient>,
    /// Lyric/video lookup gateway
    pub enricher: Arc<EnrichmentGateway>,
}

impl AppState {
    pub fn new(db: SqlitePool, llm: LlmClient, enricher: EnrichmentGateway) -> Self {
        Self {
            db,
            llm: Arc::new(llm),
            enricher: Arc::new(enricher),
        }
    }
}

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health::routes())
        .merge(api::sessions::routes())
        .merge(api::rounds::routes())
        .merge(api::playlist::routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
