//! Song catalog operations.
//!
//! Songs are a shared, session-independent catalog keyed by the normalized
//! `artist-title` string. Multiple in-flight rounds can enrich the same song
//! concurrently, so find-or-create is a single atomic upsert rather than a
//! read-then-write pair.

use anyhow::Result;
use serde::Serialize;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use crate::models::normalized_key;

/// Catalog entry
#[derive(Debug, Clone, Serialize)]
pub struct Song {
    pub id: i64,
    pub title: String,
    pub artist: String,
    pub normalized_key: String,
    pub video_url: Option<String>,
    pub lyric_source_url: Option<String>,
    pub lyric_excerpt: Option<String>,
    pub lyric_summary: Option<String>,
    pub created_at: String,
}

/// Incoming song data for find-or-create.
///
/// Optional fields are normalized so that empty strings become `None` and can
/// never clobber existing enrichment.
#[derive(Debug, Clone)]
pub struct SongUpsert {
    pub title: String,
    pub artist: String,
    pub normalized_key: String,
    pub video_url: Option<String>,
    pub lyric_source_url: Option<String>,
    pub lyric_excerpt: Option<String>,
    pub lyric_summary: Option<String>,
}

impl SongUpsert {
    pub fn new(
        title: &str,
        artist: &str,
        video_url: Option<String>,
        lyric_source_url: Option<String>,
        lyric_excerpt: Option<String>,
        lyric_summary: Option<String>,
    ) -> Self {
        Self {
            title: title.to_string(),
            artist: artist.to_string(),
            normalized_key: normalized_key(artist, title),
            video_url: non_empty(video_url),
            lyric_source_url: non_empty(lyric_source_url),
            lyric_excerpt: non_empty(lyric_excerpt),
            lyric_summary: non_empty(lyric_summary),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Find-or-create with merge semantics.
///
/// On conflict with an existing normalized key, non-NULL incoming fields
/// overwrite and NULL incoming fields preserve the stored value. One round
/// trip; the unique constraint serializes concurrent enrichment.
pub async fn find_or_create_song(pool: &SqlitePool, data: &SongUpsert) -> Result<Song> {
    let row = sqlx::query(
        r#"
        INSERT INTO songs (
            title, artist, normalized_key,
            video_url, lyric_source_url, lyric_excerpt, lyric_summary,
            created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(normalized_key) DO UPDATE SET
            video_url = COALESCE(excluded.video_url, video_url),
            lyric_source_url = COALESCE(excluded.lyric_source_url, lyric_source_url),
            lyric_excerpt = COALESCE(excluded.lyric_excerpt, lyric_excerpt),
            lyric_summary = COALESCE(excluded.lyric_summary, lyric_summary)
        RETURNING id, title, artist, normalized_key,
                  video_url, lyric_source_url, lyric_excerpt, lyric_summary, created_at
        "#,
    )
    .bind(&data.title)
    .bind(&data.artist)
    .bind(&data.normalized_key)
    .bind(&data.video_url)
    .bind(&data.lyric_source_url)
    .bind(&data.lyric_excerpt)
    .bind(&data.lyric_summary)
    .bind(super::now_rfc3339())
    .fetch_one(pool)
    .await?;

    Ok(song_from_row(&row))
}

/// Load song by id
pub async fn get_song(pool: &SqlitePool, id: i64) -> Result<Option<Song>> {
    let row = sqlx::query(
        r#"
        SELECT id, title, artist, normalized_key,
               video_url, lyric_source_url, lyric_excerpt, lyric_summary, created_at
        FROM songs
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(song_from_row))
}

fn song_from_row(row: &SqliteRow) -> Song {
    Song {
        id: row.get("id"),
        title: row.get("title"),
        artist: row.get("artist"),
        normalized_key: row.get("normalized_key"),
        video_url: row.get("video_url"),
        lyric_source_url: row.get("lyric_source_url"),
        lyric_excerpt: row.get("lyric_excerpt"),
        lyric_summary: row.get("lyric_summary"),
        created_at: row.get("created_at"),
    }
}
