//! Playlist handlers.

use axum::{
    extract::{Path, Query, State},
    routing::{delete, get},
    Json, Router,
};
use serde::Deserialize;

use crate::db::playlist::{self, PlaylistEntry};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct PlaylistQuery {
    pub session_id: Option<String>,
}

async fn get_playlist(
    State(state): State<AppState>,
    Query(query): Query<PlaylistQuery>,
) -> ApiResult<Json<Vec<PlaylistEntry>>> {
    let entries = playlist::get_playlist(&state.db, query.session_id.as_deref()).await?;
    Ok(Json(entries))
}

async fn remove_item(
    State(state): State<AppState>,
    Path(item_id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    let removed = playlist::remove_from_playlist(&state.db, item_id).await?;
    if !removed {
        return Err(ApiError::NotFound(format!(
            "Playlist item not found: {}",
            item_id
        )));
    }

    Ok(Json(serde_json::json!({ "success": true })))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/playlist", get(get_playlist))
        .route("/api/playlist/:item_id", delete(remove_item))
}
