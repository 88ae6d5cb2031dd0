//! Post-selection lyric analysis pass.
//!
//! After songs are accepted into the playlist, a detached task asks the model
//! for a short characterization of each song's lyrics and fills the item's
//! `lyric_analysis` field exactly once. Everything here is best-effort: a
//! failed or skipped analysis simply leaves the field null.

use anyhow::{Context, Result};

use crate::db::{playlist, songs};
use crate::AppState;

const SYSTEM_PROMPT: &str = "\
You are a Korean music critic. You describe the lyric style of songs: texture, \
emotional temperature, imagery and tone. Keep it to 2-3 sentences in Korean.";

/// Analyze each newly added playlist item. Runs sequentially; the batch is
/// at most one round's worth of songs.
pub async fn run_lyric_analysis(state: AppState, items: Vec<(i64, i64)>) {
    for (item_id, song_id) in items {
        if let Err(e) = analyze_one(&state, item_id, song_id).await {
            tracing::warn!(item_id, song_id, error = %e, "Lyric analysis skipped");
        }
    }
}

async fn analyze_one(state: &AppState, item_id: i64, song_id: i64) -> Result<()> {
    let song = songs::get_song(&state.db, song_id)
        .await?
        .context("Song disappeared before analysis")?;

    let mut user_prompt = format!(
        "Describe the lyric style of \"{}\" by {}.",
        song.title, song.artist
    );
    if let Some(excerpt) = &song.lyric_excerpt {
        user_prompt.push_str(&format!("\n\nRepresentative lines:\n{}", excerpt));
    }

    let analysis = state
        .llm
        .complete_text(SYSTEM_PROMPT, &user_prompt)
        .await
        .context("Analysis call failed")?;

    let written = playlist::set_lyric_analysis_once(&state.db, item_id, analysis.trim()).await?;
    if written {
        tracing::info!(item_id, song = %song.normalized_key, "Lyric analysis stored");
    }

    Ok(())
}
