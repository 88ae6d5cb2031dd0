//! Recommendation generation pipeline.
//!
//! One run per round: assemble session context, build a deterministic prompt,
//! call the model, then enrich and persist all candidates concurrently. The
//! round only becomes `ready` after every candidate has been attempted; any
//! failure in generation or persistence forces `failed`. Lookup failures
//! degrade to null fields and never fail the round.

use std::time::Duration;

use anyhow::{Context, Result};
use futures::future::join_all;

use crate::db::{playlist, rounds, sessions, songs};
use crate::models::{normalized_key, RecommendationBatch, RoundStatus};
use crate::AppState;

/// Candidates requested per round
pub const RECOMMENDATIONS_PER_ROUND: usize = 5;

/// Liked-history entries included in the prompt
const HISTORY_PROMPT_LIMIT: usize = 30;

/// Exclusion-list entries included in the prompt
const EXCLUSION_PROMPT_LIMIT: i64 = 50;

/// Server-side ceiling on one generation run. The reference client polls for
/// about two minutes; past this deadline the round is failed rather than
/// left pending behind a stalled external call.
const GENERATION_DEADLINE: Duration = Duration::from_secs(120);

const SYSTEM_PROMPT: &str = "\
You are a Korean music curator specializing in songs with exceptional lyrics.
Your expertise is in finding songs where the lyrics have literary quality, emotional depth, and distinctive texture.

You focus on these lyric qualities:
- Living language (everyday words used poetically)
- Interpretive space (lyrics that invite personal meaning)
- Emotional temperature (warmth, coolness, intimacy)
- Contemplative depth (philosophical or introspective quality)
- Imagery (vivid, sensory descriptions)

You recommend songs primarily in Korean, but can include other languages if the lyrics are outstanding.
Always recommend REAL songs by REAL artists. Never invent fictional songs.";

/// Prompt-ready view of one liked song
#[derive(Debug, Clone)]
pub struct LikedSong {
    pub artist: String,
    pub title: String,
    pub like_reason: Option<String>,
    /// Generated lyric analysis when available, else the stored summary
    pub lyric_note: Option<String>,
}

/// Everything the prompt is built from
#[derive(Debug, Clone, Default)]
pub struct PromptContext {
    pub preferences: Option<String>,
    pub seeds: Vec<(String, String)>,
    pub liked: Vec<LikedSong>,
    pub excluded: Vec<String>,
}

/// Run generation for one round and resolve its status.
///
/// Spawned as a detached task; completion is observed by polling the
/// persisted round, never through in-memory callbacks.
pub async fn run_generation(state: &AppState, round_id: i64, session_id: Option<String>) {
    tracing::info!(round_id, session_id = ?session_id, "Generation started");

    let outcome =
        tokio::time::timeout(GENERATION_DEADLINE, generate(state, round_id, session_id.as_deref()))
            .await;

    let status = match outcome {
        Ok(Ok(())) => RoundStatus::Ready,
        Ok(Err(e)) => {
            tracing::error!(round_id, error = %e, "Generation failed");
            RoundStatus::Failed
        }
        Err(_) => {
            tracing::error!(round_id, "Generation exceeded deadline");
            RoundStatus::Failed
        }
    };

    match rounds::transition_round(&state.db, round_id, &[RoundStatus::Pending], status).await {
        Ok(true) => {
            tracing::info!(round_id, status = %status, "Round resolved");
        }
        Ok(false) => {
            tracing::warn!(round_id, "Round was no longer pending; status left untouched");
        }
        Err(e) => {
            tracing::error!(round_id, error = %e, "Failed to persist round status");
        }
    }
}

async fn generate(state: &AppState, round_id: i64, session_id: Option<&str>) -> Result<()> {
    let ctx = assemble_context(state, session_id).await?;
    let user_prompt = build_user_prompt(&ctx);

    let content = state
        .llm
        .complete_json(SYSTEM_PROMPT, &user_prompt)
        .await
        .context("Text-generation call failed")?;

    let batch = RecommendationBatch::parse(&content)?;
    persist_batch(state, round_id, &batch).await
}

/// Load preferences, seeds, liked history and the exclusion set for the
/// scope. Without a session this degrades to the global playlist view.
pub async fn assemble_context(state: &AppState, session_id: Option<&str>) -> Result<PromptContext> {
    let (preferences, seeds) = match session_id {
        Some(sid) => {
            let session = sessions::get_session(&state.db, sid).await?;
            let preferences = session
                .and_then(|s| s.preferences)
                .filter(|p| !p.trim().is_empty());
            let seeds = sessions::get_seed_songs(&state.db, sid)
                .await?
                .into_iter()
                .map(|s| (s.artist, s.title))
                .collect();
            (preferences, seeds)
        }
        None => (None, Vec::new()),
    };

    // Reverse-chronological; keep only the most recent entries
    let liked = playlist::get_playlist(&state.db, session_id)
        .await?
        .into_iter()
        .take(HISTORY_PROMPT_LIMIT)
        .map(|entry| LikedSong {
            artist: entry.song.artist,
            title: entry.song.title,
            like_reason: entry.like_reason,
            lyric_note: entry.lyric_analysis.or(entry.song.lyric_summary),
        })
        .collect();

    let excluded =
        rounds::recommended_song_keys(&state.db, session_id, EXCLUSION_PROMPT_LIMIT).await?;

    Ok(PromptContext {
        preferences,
        seeds,
        liked,
        excluded,
    })
}

/// Deterministic user prompt: fixed section order, same context in, same
/// prompt out.
pub fn build_user_prompt(ctx: &PromptContext) -> String {
    let mut prompt = format!(
        "Generate exactly {} song recommendations based on the listener's taste.\n",
        RECOMMENDATIONS_PER_ROUND
    );

    if let Some(preferences) = &ctx.preferences {
        prompt.push_str("\nStated preferences:\n");
        prompt.push_str(preferences);
        prompt.push('\n');
    }

    if !ctx.seeds.is_empty() {
        prompt.push_str("\nExample songs the listener already loves:\n");
        for (artist, title) in &ctx.seeds {
            prompt.push_str(&format!("- {} - {}\n", artist, title));
        }
    }

    if !ctx.liked.is_empty() {
        prompt.push_str("\nSongs the listener has liked:\n");
        for song in &ctx.liked {
            prompt.push_str(&format!("- {} - {}", song.artist, song.title));
            if let Some(reason) = &song.like_reason {
                prompt.push_str(&format!(" (why they liked it: {})", reason));
            }
            if let Some(note) = &song.lyric_note {
                prompt.push_str(&format!(" (lyric style: {})", note));
            }
            prompt.push('\n');
        }
        prompt.push_str(
            "\nReuse the lyric-style patterns from the liked songs above when choosing new ones.\n",
        );
    }

    if ctx.preferences.is_none() && ctx.seeds.is_empty() && ctx.liked.is_empty() {
        prompt.push_str(
            "\nThis is the first recommendation. Start with a diverse selection of Korean songs \
             known for exceptional lyrics.\n",
        );
    }

    if !ctx.excluded.is_empty() {
        prompt.push_str("\nSongs already recommended (DO NOT recommend these again):\n");
        for key in &ctx.excluded {
            prompt.push_str(&format!("- {}\n", key));
        }
    }

    prompt.push_str(&format!(
        "\nRules:
- Recommend exactly {count} songs
- Each must be a REAL song by a REAL artist
- Prioritize Korean songs with beautiful lyrics
- Mix well-known and lesser-known artists
- Avoid repeating any previously recommended songs
- For lyric_excerpt: provide 2-4 actual representative lines from the song's lyrics in the original language
- For lyric_style_summary: describe the lyric texture/feel in Korean (2-3 sentences)

Respond in this exact JSON format:
{{
  \"recommendations\": [
    {{
      \"title\": \"song title\",
      \"artist\": \"artist name\",
      \"reason\": \"why this song fits the listener's taste (in Korean)\",
      \"lyric_style_summary\": \"description of lyric texture and feel (in Korean)\",
      \"lyric_excerpt\": \"2-4 representative lines from the actual lyrics\"
    }}
  ]
}}",
        count = RECOMMENDATIONS_PER_ROUND
    ));

    prompt
}

/// Enrich and persist all candidates concurrently, then join.
///
/// Per candidate: both lookups run concurrently and may resolve to nothing;
/// the song is catalog-merged and the ranked item inserted. A persistence
/// error in any candidate fails the whole batch (the caller marks the round
/// failed); lookup failures never do.
pub async fn persist_batch(
    state: &AppState,
    round_id: i64,
    batch: &RecommendationBatch,
) -> Result<()> {
    let candidates = batch
        .recommendations
        .iter()
        .take(RECOMMENDATIONS_PER_ROUND)
        .enumerate()
        .map(|(index, rec)| async move {
            let key = normalized_key(&rec.artist, &rec.title);
            let (lyric_url, video_url) = state.enricher.enrich(&rec.artist, &rec.title).await;

            tracing::debug!(
                round_id,
                rank = index + 1,
                song = %key,
                lyric_found = lyric_url.is_some(),
                video_found = video_url.is_some(),
                "Candidate enriched"
            );

            let song = songs::find_or_create_song(
                &state.db,
                &songs::SongUpsert::new(
                    &rec.title,
                    &rec.artist,
                    video_url,
                    lyric_url,
                    Some(rec.lyric_excerpt.clone()),
                    Some(rec.lyric_style_summary.clone()),
                ),
            )
            .await
            .with_context(|| format!("Failed to upsert song {}", key))?;

            rounds::add_recommendation_item(
                &state.db,
                round_id,
                song.id,
                (index + 1) as i64,
                Some(&rec.reason),
                Some(&rec.lyric_style_summary),
            )
            .await
            .with_context(|| format!("Failed to persist item for song {}", key))
        });

    // Barrier: every candidate is attempted before the round resolves
    let results = join_all(candidates).await;
    for result in results {
        result?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> PromptContext {
        PromptContext {
            preferences: Some("멜랑콜리한 가사".to_string()),
            seeds: vec![("아이유".to_string(), "너의 의미".to_string())],
            liked: vec![LikedSong {
                artist: "검정치마".to_string(),
                title: "기다린 만큼, 더".to_string(),
                like_reason: Some("쓸쓸한 분위기".to_string()),
                lyric_note: Some("담담하고 서정적인 어조".to_string()),
            }],
            excluded: vec!["아이유-blueming".to_string()],
        }
    }

    #[test]
    fn test_prompt_sections_in_fixed_order() {
        let prompt = build_user_prompt(&context());

        let preferences = prompt.find("Stated preferences:").unwrap();
        let seeds = prompt.find("Example songs the listener already loves:").unwrap();
        let liked = prompt.find("Songs the listener has liked:").unwrap();
        let excluded = prompt.find("Songs already recommended").unwrap();
        let rules = prompt.find("Rules:").unwrap();

        assert!(preferences < seeds);
        assert!(seeds < liked);
        assert!(liked < excluded);
        assert!(excluded < rules);
        assert!(!prompt.contains("This is the first recommendation"));
    }

    #[test]
    fn test_prompt_is_deterministic() {
        assert_eq!(build_user_prompt(&context()), build_user_prompt(&context()));
    }

    #[test]
    fn test_prompt_carries_reasons_and_analyses() {
        let prompt = build_user_prompt(&context());
        assert!(prompt.contains("why they liked it: 쓸쓸한 분위기"));
        assert!(prompt.contains("lyric style: 담담하고 서정적인 어조"));
        assert!(prompt.contains("- 아이유-blueming"));
    }

    #[test]
    fn test_prompt_first_run_fallback() {
        let prompt = build_user_prompt(&PromptContext::default());
        assert!(prompt.contains("This is the first recommendation"));
        assert!(!prompt.contains("Stated preferences:"));
        assert!(!prompt.contains("Songs the listener has liked:"));
    }

    #[test]
    fn test_prompt_mandates_count_and_json_shape() {
        let prompt = build_user_prompt(&PromptContext::default());
        assert!(prompt.contains("Recommend exactly 5 songs"));
        assert!(prompt.contains("\"recommendations\""));
        assert!(prompt.contains("\"lyric_excerpt\""));
    }
}
