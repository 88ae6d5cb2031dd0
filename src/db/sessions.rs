//! Session and seed song operations.
//!
//! A session is the root aggregate for personalization state; deleting one
//! cascades to its seed songs, rounds and playlist items. The session id is
//! supplied by the client at creation time.

use anyhow::Result;
use serde::Serialize;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

/// Discovery context owned by one user
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: String,
    pub name: Option<String>,
    pub preferences: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// User-supplied example song biasing the first round
#[derive(Debug, Clone, Serialize)]
pub struct SeedSong {
    pub id: i64,
    pub session_id: String,
    pub title: String,
    pub artist: String,
    pub added_at: String,
}

pub async fn create_session(
    pool: &SqlitePool,
    id: &str,
    name: Option<&str>,
    preferences: Option<&str>,
) -> Result<Session> {
    let now = super::now_rfc3339();
    let row = sqlx::query(
        r#"
        INSERT INTO sessions (id, name, preferences, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?)
        RETURNING id, name, preferences, created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(name)
    .bind(preferences)
    .bind(&now)
    .bind(&now)
    .fetch_one(pool)
    .await?;

    Ok(session_from_row(&row))
}

pub async fn get_session(pool: &SqlitePool, id: &str) -> Result<Option<Session>> {
    let row = sqlx::query(
        "SELECT id, name, preferences, created_at, updated_at FROM sessions WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(session_from_row))
}

/// Partial update: absent fields keep their stored value.
pub async fn update_session(
    pool: &SqlitePool,
    id: &str,
    name: Option<&str>,
    preferences: Option<&str>,
) -> Result<Option<Session>> {
    sqlx::query(
        r#"
        UPDATE sessions
        SET name = COALESCE(?, name),
            preferences = COALESCE(?, preferences),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(name)
    .bind(preferences)
    .bind(super::now_rfc3339())
    .bind(id)
    .execute(pool)
    .await?;

    get_session(pool, id).await
}

/// All sessions, most recently updated first.
pub async fn list_sessions(pool: &SqlitePool) -> Result<Vec<Session>> {
    let rows = sqlx::query(
        r#"
        SELECT id, name, preferences, created_at, updated_at
        FROM sessions
        ORDER BY updated_at DESC, id
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(session_from_row).collect())
}

/// Delete session; cascades to seed songs, rounds and playlist items.
pub async fn delete_session(pool: &SqlitePool, id: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM sessions WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn add_seed_song(
    pool: &SqlitePool,
    session_id: &str,
    title: &str,
    artist: &str,
) -> Result<SeedSong> {
    let row = sqlx::query(
        r#"
        INSERT INTO seed_songs (session_id, title, artist, added_at)
        VALUES (?, ?, ?, ?)
        RETURNING id, session_id, title, artist, added_at
        "#,
    )
    .bind(session_id)
    .bind(title)
    .bind(artist)
    .bind(super::now_rfc3339())
    .fetch_one(pool)
    .await?;

    Ok(seed_from_row(&row))
}

pub async fn get_seed_songs(pool: &SqlitePool, session_id: &str) -> Result<Vec<SeedSong>> {
    let rows = sqlx::query(
        r#"
        SELECT id, session_id, title, artist, added_at
        FROM seed_songs
        WHERE session_id = ?
        ORDER BY id
        "#,
    )
    .bind(session_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(seed_from_row).collect())
}

pub async fn delete_seed_song(pool: &SqlitePool, session_id: &str, seed_id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM seed_songs WHERE id = ? AND session_id = ?")
        .bind(seed_id)
        .bind(session_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

fn session_from_row(row: &SqliteRow) -> Session {
    Session {
        id: row.get("id"),
        name: row.get("name"),
        preferences: row.get("preferences"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn seed_from_row(row: &SqliteRow) -> SeedSong {
    SeedSong {
        id: row.get("id"),
        session_id: row.get("session_id"),
        title: row.get("title"),
        artist: row.get("artist"),
        added_at: row.get("added_at"),
    }
}
