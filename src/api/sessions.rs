//! Session lifecycle handlers.

use axum::{
    extract::{Path, State},
    routing::{delete, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::db::sessions::{self, SeedSong, Session};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub id: Option<String>,
    pub name: Option<String>,
    pub preferences: Option<String>,
    #[serde(default)]
    pub seed_songs: Vec<SeedSongInput>,
}

#[derive(Debug, Deserialize)]
pub struct SeedSongInput {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub artist: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSessionRequest {
    pub name: Option<String>,
    pub preferences: Option<String>,
}

/// Session with its seed songs attached
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    #[serde(flatten)]
    pub session: Session,
    pub seed_songs: Vec<SeedSong>,
}

async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> ApiResult<Json<SessionResponse>> {
    let id = request
        .id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Session id is required".to_string()))?;

    // Single insert; the primary key resolves concurrent creates of the
    // same id to exactly one winner.
    let session = match sessions::create_session(
        &state.db,
        id,
        request.name.as_deref(),
        request.preferences.as_deref(),
    )
    .await
    {
        Ok(session) => session,
        Err(e) if is_unique_violation(&e) => {
            return Err(ApiError::Conflict(format!("Session already exists: {}", id)));
        }
        Err(e) => return Err(e.into()),
    };

    for seed in &request.seed_songs {
        // Skip incomplete seed entries rather than failing the whole create
        if !seed.title.trim().is_empty() && !seed.artist.trim().is_empty() {
            sessions::add_seed_song(&state.db, id, seed.title.trim(), seed.artist.trim()).await?;
        }
    }

    let seed_songs = sessions::get_seed_songs(&state.db, id).await?;
    tracing::info!(session_id = %id, seeds = seed_songs.len(), "Session created");

    Ok(Json(SessionResponse {
        session,
        seed_songs,
    }))
}

async fn list_sessions(State(state): State<AppState>) -> ApiResult<Json<Vec<Session>>> {
    Ok(Json(sessions::list_sessions(&state.db).await?))
}

async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<SessionResponse>> {
    let session = sessions::get_session(&state.db, &session_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Session not found: {}", session_id)))?;

    let seed_songs = sessions::get_seed_songs(&state.db, &session_id).await?;
    Ok(Json(SessionResponse {
        session,
        seed_songs,
    }))
}

async fn update_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<UpdateSessionRequest>,
) -> ApiResult<Json<SessionResponse>> {
    let session = sessions::update_session(
        &state.db,
        &session_id,
        request.name.as_deref(),
        request.preferences.as_deref(),
    )
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("Session not found: {}", session_id)))?;

    let seed_songs = sessions::get_seed_songs(&state.db, &session_id).await?;
    Ok(Json(SessionResponse {
        session,
        seed_songs,
    }))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let deleted = sessions::delete_session(&state.db, &session_id).await?;
    if !deleted {
        return Err(ApiError::NotFound(format!(
            "Session not found: {}",
            session_id
        )));
    }

    tracing::info!(session_id = %session_id, "Session deleted");
    Ok(Json(serde_json::json!({ "success": true })))
}

async fn delete_seed_song(
    State(state): State<AppState>,
    Path((session_id, seed_id)): Path<(String, i64)>,
) -> ApiResult<Json<serde_json::Value>> {
    let deleted = sessions::delete_seed_song(&state.db, &session_id, seed_id).await?;
    if !deleted {
        return Err(ApiError::NotFound(format!(
            "Seed song {} not found in session {}",
            seed_id, session_id
        )));
    }

    Ok(Json(serde_json::json!({ "success": true })))
}

fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.downcast_ref::<sqlx::Error>()
        .and_then(|e| e.as_database_error())
        .map(|db_err| db_err.is_unique_violation())
        .unwrap_or(false)
}


pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/sessions", get(list_sessions).post(create_session))
        .route(
            "/api/sessions/:session_id",
            get(get_session)
                .patch(update_session)
                .delete(delete_session),
        )
        .route(
            "/api/sessions/:session_id/seeds/:seed_id",
            delete(delete_seed_song),
        )
}
