//! Playlist operations: the session's permanent collection of accepted songs.

use anyhow::Result;
use serde::Serialize;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use super::songs::Song;

/// One accepted song
#[derive(Debug, Clone, Serialize)]
pub struct PlaylistItem {
    pub id: i64,
    pub session_id: Option<String>,
    pub song_id: i64,
    pub round_id: Option<i64>,
    pub like_reason: Option<String>,
    pub lyric_analysis: Option<String>,
    pub selected_at: String,
}

/// Playlist item annotated with its song
#[derive(Debug, Clone, Serialize)]
pub struct PlaylistEntry {
    pub id: i64,
    pub session_id: Option<String>,
    pub round_id: Option<i64>,
    pub like_reason: Option<String>,
    pub lyric_analysis: Option<String>,
    pub selected_at: String,
    pub song: Song,
}

pub async fn add_to_playlist(
    pool: &SqlitePool,
    song_id: i64,
    session_id: Option<&str>,
    round_id: Option<i64>,
    like_reason: Option<&str>,
) -> Result<PlaylistItem> {
    let row = sqlx::query(
        r#"
        INSERT INTO playlist_items (session_id, song_id, round_id, like_reason, selected_at)
        VALUES (?, ?, ?, ?, ?)
        RETURNING id, session_id, song_id, round_id, like_reason, lyric_analysis, selected_at
        "#,
    )
    .bind(session_id)
    .bind(song_id)
    .bind(round_id)
    .bind(like_reason)
    .bind(super::now_rfc3339())
    .fetch_one(pool)
    .await?;

    Ok(item_from_row(&row))
}

/// Playlist entries, most recently selected first. Scoped to a session when
/// one is given, global otherwise.
pub async fn get_playlist(
    pool: &SqlitePool,
    session_id: Option<&str>,
) -> Result<Vec<PlaylistEntry>> {
    let rows = sqlx::query(
        r#"
        SELECT pi.id, pi.session_id, pi.round_id, pi.like_reason, pi.lyric_analysis,
               pi.selected_at,
               s.id AS song_id, s.title, s.artist, s.normalized_key,
               s.video_url, s.lyric_source_url, s.lyric_excerpt, s.lyric_summary, s.created_at
        FROM playlist_items pi
        JOIN songs s ON s.id = pi.song_id
        WHERE (? IS NULL OR pi.session_id = ?)
        ORDER BY pi.selected_at DESC, pi.id DESC
        "#,
    )
    .bind(session_id)
    .bind(session_id)
    .fetch_all(pool)
    .await?;

    let entries = rows
        .iter()
        .map(|row| PlaylistEntry {
            id: row.get("id"),
            session_id: row.get("session_id"),
            round_id: row.get("round_id"),
            like_reason: row.get("like_reason"),
            lyric_analysis: row.get("lyric_analysis"),
            selected_at: row.get("selected_at"),
            song: Song {
                id: row.get("song_id"),
                title: row.get("title"),
                artist: row.get("artist"),
                normalized_key: row.get("normalized_key"),
                video_url: row.get("video_url"),
                lyric_source_url: row.get("lyric_source_url"),
                lyric_excerpt: row.get("lyric_excerpt"),
                lyric_summary: row.get("lyric_summary"),
                created_at: row.get("created_at"),
            },
        })
        .collect();

    Ok(entries)
}

pub async fn remove_from_playlist(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM playlist_items WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Fill the lyric analysis exactly once; a populated field is never
/// overwritten. Returns whether the write happened.
pub async fn set_lyric_analysis_once(
    pool: &SqlitePool,
    item_id: i64,
    analysis: &str,
) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE playlist_items SET lyric_analysis = ? WHERE id = ? AND lyric_analysis IS NULL",
    )
    .bind(analysis)
    .bind(item_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

fn item_from_row(row: &SqliteRow) -> PlaylistItem {
    PlaylistItem {
        id: row.get("id"),
        session_id: row.get("session_id"),
        song_id: row.get("song_id"),
        round_id: row.get("round_id"),
        like_reason: row.get("like_reason"),
        lyric_analysis: row.get("lyric_analysis"),
        selected_at: row.get("selected_at"),
    }
}
