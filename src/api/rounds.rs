//! Recommendation round handlers: start, poll, select.
//!
//! Starting a round returns immediately with `pending`; generation runs as a
//! detached task and clients poll until the round is terminal. Selection
//! consumes the round and pipelines the next one so a fresh batch is already
//! in flight when the client sees the confirmation.

use std::collections::HashMap;
use std::collections::HashSet;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::db::rounds::{self, Round, RoundItem};
use crate::db::{playlist, sessions, songs};
use crate::error::{ApiError, ApiResult};
use crate::models::RoundStatus;
use crate::services::{analysis, recommender};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct NextRoundRequest {
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RoundSummary {
    pub round_id: i64,
    pub status: RoundStatus,
}

#[derive(Debug, Serialize)]
pub struct RoundResponse {
    pub round_id: i64,
    pub status: RoundStatus,
    pub items: Vec<RoundItem>,
}

#[derive(Debug, Deserialize)]
pub struct SelectRequest {
    pub selected_song_ids: Vec<i64>,
    /// Per-song free-text like reasons, keyed by song id
    #[serde(default)]
    pub like_reasons: HashMap<i64, String>,
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SelectResponse {
    pub playlist_updated: bool,
    pub autoplay_song: Option<songs::Song>,
    pub next_round: RoundSummary,
}

/// Create a pending round and kick off generation in the background.
async fn start_next_round(
    State(state): State<AppState>,
    Json(request): Json<NextRoundRequest>,
) -> ApiResult<Json<RoundSummary>> {
    let round = create_and_spawn(&state, request.session_id).await?;
    Ok(Json(RoundSummary {
        round_id: round.id,
        status: round.status,
    }))
}

/// Poll a round. Items are exposed only for ready/consumed rounds.
async fn get_round(
    State(state): State<AppState>,
    Path(round_id): Path<i64>,
) -> ApiResult<Json<RoundResponse>> {
    let round = rounds::get_round(&state.db, round_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Round not found: {}", round_id)))?;

    let items = if round.status.exposes_items() {
        rounds::get_round_items(&state.db, round_id).await?
    } else {
        Vec::new()
    };

    Ok(Json(RoundResponse {
        round_id: round.id,
        status: round.status,
        items,
    }))
}

/// Consume a round: flip selected items, append them to the playlist, then
/// pipeline the next round. Zero selections is a valid skip.
async fn select_songs(
    State(state): State<AppState>,
    Path(round_id): Path<i64>,
    Json(request): Json<SelectRequest>,
) -> ApiResult<Json<SelectResponse>> {
    let round = rounds::get_round(&state.db, round_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Round not found: {}", round_id)))?;

    if !round.status.selectable() {
        return Err(ApiError::Conflict(format!(
            "Round {} is {}; selection requires ready or failed",
            round_id, round.status
        )));
    }

    // Selected ids must come from this round's items
    let items = rounds::get_round_items(&state.db, round_id).await?;
    let round_song_ids: HashSet<i64> = items.iter().map(|item| item.song.id).collect();
    for song_id in &request.selected_song_ids {
        if !round_song_ids.contains(song_id) {
            return Err(ApiError::BadRequest(format!(
                "Song {} is not part of round {}",
                song_id, round_id
            )));
        }
    }

    // Consume first: under concurrent selection requests exactly one wins
    // and the loser has no side effects.
    let consumed = rounds::transition_round(
        &state.db,
        round_id,
        &[RoundStatus::Ready, RoundStatus::Failed],
        RoundStatus::Consumed,
    )
    .await?;
    if !consumed {
        return Err(ApiError::Conflict(format!(
            "Round {} was already consumed",
            round_id
        )));
    }

    rounds::mark_items_selected(&state.db, round_id, &request.selected_song_ids).await?;

    let mut new_items = Vec::new();
    for song_id in &request.selected_song_ids {
        let like_reason = request.like_reasons.get(song_id).map(String::as_str);
        let item = playlist::add_to_playlist(
            &state.db,
            *song_id,
            request.session_id.as_deref(),
            Some(round_id),
            like_reason,
        )
        .await?;
        new_items.push((item.id, *song_id));
    }

    tracing::info!(
        round_id,
        selected = request.selected_song_ids.len(),
        session_id = ?request.session_id,
        "Round consumed"
    );

    let autoplay_song = match pick_autoplay(&request.selected_song_ids) {
        Some(song_id) => songs::get_song(&state.db, song_id).await?,
        None => None,
    };

    // Pipelining: the next batch is already generating when the client sees
    // this response.
    let next_round = create_and_spawn(&state, request.session_id.clone()).await?;

    if !new_items.is_empty() {
        let analysis_state = state.clone();
        tokio::spawn(async move {
            analysis::run_lyric_analysis(analysis_state, new_items).await;
        });
    }

    Ok(Json(SelectResponse {
        playlist_updated: !request.selected_song_ids.is_empty(),
        autoplay_song,
        next_round: RoundSummary {
            round_id: next_round.id,
            status: next_round.status,
        },
    }))
}

fn pick_autoplay(selected: &[i64]) -> Option<i64> {
    selected.choose(&mut rand::thread_rng()).copied()
}

async fn create_and_spawn(state: &AppState, session_id: Option<String>) -> ApiResult<Round> {
    if let Some(sid) = session_id.as_deref() {
        sessions::get_session(&state.db, sid)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Session not found: {}", sid)))?;
    }

    let round = rounds::create_round(&state.db, session_id.as_deref()).await?;
    spawn_generation(state.clone(), round.id, session_id);
    Ok(round)
}

/// Detached background generation; completion is observed only through the
/// persisted round status.
fn spawn_generation(state: AppState, round_id: i64, session_id: Option<String>) {
    tokio::spawn(async move {
        recommender::run_generation(&state, round_id, session_id).await;
    });
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/recommendations/next", post(start_next_round))
        .route("/api/recommendations/:round_id", get(get_round))
        .route("/api/recommendations/:round_id/select", post(select_songs))
}
