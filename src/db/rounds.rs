//! Recommendation round and item operations.
//!
//! Round status writes go through a conditional update: the transition only
//! happens when the current status is one of the expected prior states, so
//! the generator and the selection handler cannot race each other into an
//! illegal lifecycle edge.

use anyhow::Result;
use serde::Serialize;
use sqlx::{Row, SqlitePool};

use crate::models::RoundStatus;

use super::songs::Song;

/// One generation batch
#[derive(Debug, Clone, Serialize)]
pub struct Round {
    pub id: i64,
    pub session_id: Option<String>,
    pub status: RoundStatus,
    pub created_at: String,
}

/// One ranked candidate within a round, with its song attached
#[derive(Debug, Clone, Serialize)]
pub struct RoundItem {
    pub id: i64,
    pub round_id: i64,
    pub rank: i64,
    pub why_recommended: Option<String>,
    pub lyric_style_summary: Option<String>,
    pub is_selected: bool,
    pub song: Song,
}

/// Insert a new round in `pending` state.
pub async fn create_round(pool: &SqlitePool, session_id: Option<&str>) -> Result<Round> {
    let created_at = super::now_rfc3339();
    let row = sqlx::query(
        r#"
        INSERT INTO recommendation_rounds (session_id, status, created_at)
        VALUES (?, 'pending', ?)
        RETURNING id, session_id, status, created_at
        "#,
    )
    .bind(session_id)
    .bind(&created_at)
    .fetch_one(pool)
    .await?;

    Ok(round_from_row(&row)?)
}

/// Load round by id
pub async fn get_round(pool: &SqlitePool, id: i64) -> Result<Option<Round>> {
    let row = sqlx::query(
        "SELECT id, session_id, status, created_at FROM recommendation_rounds WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Ok(Some(round_from_row(&row)?)),
        None => Ok(None),
    }
}

/// Conditionally transition a round's status.
///
/// Returns true when the row was updated, false when the round was absent or
/// its current status was not one of `from`. Callers treat false as "another
/// writer got there first".
pub async fn transition_round(
    pool: &SqlitePool,
    id: i64,
    from: &[RoundStatus],
    to: RoundStatus,
) -> Result<bool> {
    let placeholders = vec!["?"; from.len()].join(", ");
    let sql = format!(
        "UPDATE recommendation_rounds SET status = ? WHERE id = ? AND status IN ({})",
        placeholders
    );

    let mut query = sqlx::query(&sql).bind(to.as_str()).bind(id);
    for status in from {
        query = query.bind(status.as_str());
    }

    let result = query.execute(pool).await?;
    Ok(result.rows_affected() > 0)
}

/// Persist one ranked candidate.
pub async fn add_recommendation_item(
    pool: &SqlitePool,
    round_id: i64,
    song_id: i64,
    rank: i64,
    why_recommended: Option<&str>,
    lyric_style_summary: Option<&str>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO recommendation_items
            (round_id, song_id, rank, why_recommended, lyric_style_summary, is_selected)
        VALUES (?, ?, ?, ?, ?, 0)
        "#,
    )
    .bind(round_id)
    .bind(song_id)
    .bind(rank)
    .bind(why_recommended)
    .bind(lyric_style_summary)
    .execute(pool)
    .await?;

    Ok(())
}

/// Load a round's items in rank order, each with its song.
pub async fn get_round_items(pool: &SqlitePool, round_id: i64) -> Result<Vec<RoundItem>> {
    let rows = sqlx::query(
        r#"
        SELECT ri.id, ri.round_id, ri.rank, ri.why_recommended, ri.lyric_style_summary,
               ri.is_selected,
               s.id AS song_id, s.title, s.artist, s.normalized_key,
               s.video_url, s.lyric_source_url, s.lyric_excerpt, s.lyric_summary, s.created_at
        FROM recommendation_items ri
        JOIN songs s ON s.id = ri.song_id
        WHERE ri.round_id = ?
        ORDER BY ri.rank
        "#,
    )
    .bind(round_id)
    .fetch_all(pool)
    .await?;

    let items = rows
        .iter()
        .map(|row| RoundItem {
            id: row.get("id"),
            round_id: row.get("round_id"),
            rank: row.get("rank"),
            why_recommended: row.get("why_recommended"),
            lyric_style_summary: row.get("lyric_style_summary"),
            is_selected: row.get::<i64, _>("is_selected") != 0,
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

    Ok(items)
}

/// Flip the selected flag for the chosen songs of one round.
pub async fn mark_items_selected(
    pool: &SqlitePool,
    round_id: i64,
    song_ids: &[i64],
) -> Result<()> {
    if song_ids.is_empty() {
        return Ok(());
    }

    let placeholders = vec!["?"; song_ids.len()].join(", ");
    let sql = format!(
        "UPDATE recommendation_items SET is_selected = 1 WHERE round_id = ? AND song_id IN ({})",
        placeholders
    );

    let mut query = sqlx::query(&sql).bind(round_id);
    for song_id in song_ids {
        query = query.bind(song_id);
    }
    query.execute(pool).await?;

    Ok(())
}

/// Exclusion set: normalized keys of songs already recommended, most recent
/// `limit` entries, in chronological order. Scoped to a session when one is
/// given, global otherwise.
pub async fn recommended_song_keys(
    pool: &SqlitePool,
    session_id: Option<&str>,
    limit: i64,
) -> Result<Vec<String>> {
    let rows = sqlx::query(
        r#"
        SELECT s.normalized_key
        FROM recommendation_items ri
        JOIN recommendation_rounds r ON r.id = ri.round_id
        JOIN songs s ON s.id = ri.song_id
        WHERE (? IS NULL OR r.session_id = ?)
        ORDER BY ri.id DESC
        LIMIT ?
        "#,
    )
    .bind(session_id)
    .bind(session_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    let mut keys: Vec<String> = rows.iter().map(|row| row.get("normalized_key")).collect();
    keys.reverse();
    Ok(keys)
}

fn round_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Round> {
    let status_str: String = row.get("status");
    let status = RoundStatus::parse(&status_str)
        .ok_or_else(|| anyhow::anyhow!("Unknown round status in database: {}", status_str))?;

    Ok(Round {
        id: row.get("id"),
        session_id: row.get("session_id"),
        status,
        created_at: row.get("created_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;
    use crate::db::songs::{find_or_create_song, SongUpsert};

    async fn seed_song(pool: &SqlitePool, title: &str, artist: &str) -> Song {
        find_or_create_song(pool, &SongUpsert::new(title, artist, None, None, None, None))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_round_starts_pending() {
        let pool = memory_pool().await;

        let round = create_round(&pool, None).await.unwrap();
        assert_eq!(round.status, RoundStatus::Pending);
        assert!(round.session_id.is_none());

        let loaded = get_round(&pool, round.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, RoundStatus::Pending);
    }

    #[tokio::test]
    async fn test_get_round_absent() {
        let pool = memory_pool().await;
        assert!(get_round(&pool, 99).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_transition_round_conditional() {
        let pool = memory_pool().await;
        let round = create_round(&pool, None).await.unwrap();

        // pending -> ready succeeds
        let moved = transition_round(&pool, round.id, &[RoundStatus::Pending], RoundStatus::Ready)
            .await
            .unwrap();
        assert!(moved);

        // a second pending-guarded write loses the race
        let moved = transition_round(&pool, round.id, &[RoundStatus::Pending], RoundStatus::Failed)
            .await
            .unwrap();
        assert!(!moved);

        // ready|failed -> consumed succeeds
        let moved = transition_round(
            &pool,
            round.id,
            &[RoundStatus::Ready, RoundStatus::Failed],
            RoundStatus::Consumed,
        )
        .await
        .unwrap();
        assert!(moved);

        // consumed is terminal
        let moved = transition_round(
            &pool,
            round.id,
            &[RoundStatus::Ready, RoundStatus::Failed],
            RoundStatus::Consumed,
        )
        .await
        .unwrap();
        assert!(!moved);

        let loaded = get_round(&pool, round.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, RoundStatus::Consumed);
    }

    #[tokio::test]
    async fn test_items_ordered_by_rank() {
        let pool = memory_pool().await;
        let round = create_round(&pool, None).await.unwrap();

        let a = seed_song(&pool, "A", "aa").await;
        let b = seed_song(&pool, "B", "bb").await;
        add_recommendation_item(&pool, round.id, b.id, 2, Some("second"), None)
            .await
            .unwrap();
        add_recommendation_item(&pool, round.id, a.id, 1, Some("first"), None)
            .await
            .unwrap();

        let items = get_round_items(&pool, round.id).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].rank, 1);
        assert_eq!(items[0].song.id, a.id);
        assert_eq!(items[1].rank, 2);
        assert!(!items[0].is_selected);
    }

    #[tokio::test]
    async fn test_mark_items_selected() {
        let pool = memory_pool().await;
        let round = create_round(&pool, None).await.unwrap();
        let a = seed_song(&pool, "A", "aa").await;
        let b = seed_song(&pool, "B", "bb").await;
        add_recommendation_item(&pool, round.id, a.id, 1, None, None)
            .await
            .unwrap();
        add_recommendation_item(&pool, round.id, b.id, 2, None, None)
            .await
            .unwrap();

        mark_items_selected(&pool, round.id, &[a.id]).await.unwrap();

        let items = get_round_items(&pool, round.id).await.unwrap();
        assert!(items[0].is_selected);
        assert!(!items[1].is_selected);
    }

    #[tokio::test]
    async fn test_recommended_song_keys_scoped_by_session() {
        let pool = memory_pool().await;
        crate::db::sessions::create_session(&pool, "s1", None, None)
            .await
            .unwrap();

        let scoped_round = create_round(&pool, Some("s1")).await.unwrap();
        let global_round = create_round(&pool, None).await.unwrap();

        let a = seed_song(&pool, "A", "aa").await;
        let b = seed_song(&pool, "B", "bb").await;
        add_recommendation_item(&pool, scoped_round.id, a.id, 1, None, None)
            .await
            .unwrap();
        add_recommendation_item(&pool, global_round.id, b.id, 1, None, None)
            .await
            .unwrap();

        let scoped = recommended_song_keys(&pool, Some("s1"), 50).await.unwrap();
        assert_eq!(scoped, vec!["aa-a".to_string()]);

        let global = recommended_song_keys(&pool, None, 50).await.unwrap();
        assert_eq!(global, vec!["aa-a".to_string(), "bb-b".to_string()]);
    }

    #[tokio::test]
    async fn test_recommended_song_keys_keeps_most_recent() {
        let pool = memory_pool().await;
        let round = create_round(&pool, None).await.unwrap();

        for i in 0..4 {
            let song = seed_song(&pool, &format!("T{}", i), "artist").await;
            add_recommendation_item(&pool, round.id, song.id, i + 1, None, None)
                .await
                .unwrap();
        }

        let keys = recommended_song_keys(&pool, None, 2).await.unwrap();
        assert_eq!(keys, vec!["artist-t2".to_string(), "artist-t3".to_string()]);
    }
}
