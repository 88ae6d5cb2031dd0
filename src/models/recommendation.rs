//! Structured output contract for the text-generation call.
//!
//! The model is instructed to return a JSON object with exactly five
//! recommendations. Anything that does not parse into [`RecommendationBatch`]
//! with at least one entry is a contract violation handled as generation
//! failure by the caller.

use anyhow::{bail, Context, Result};
use serde::Deserialize;

/// One candidate song as produced by the model
#[derive(Debug, Clone, Deserialize)]
pub struct CandidateSong {
    pub title: String,
    pub artist: String,
    /// Why the song fits the listener's taste
    #[serde(default)]
    pub reason: String,
    /// Lyric texture description (2-3 sentences)
    #[serde(default)]
    pub lyric_style_summary: String,
    /// 2-4 representative lines from the actual lyrics
    #[serde(default)]
    pub lyric_excerpt: String,
}

/// Full model response
#[derive(Debug, Deserialize)]
pub struct RecommendationBatch {
    pub recommendations: Vec<CandidateSong>,
}

impl RecommendationBatch {
    /// Parse raw model output. Non-JSON output, a wrong shape, or zero
    /// recommendations all reject the batch.
    pub fn parse(content: &str) -> Result<Self> {
        let batch: RecommendationBatch =
            serde_json::from_str(content).context("Model output is not the expected JSON shape")?;
        if batch.recommendations.is_empty() {
            bail!("Model returned zero recommendations");
        }
        Ok(batch)
    }
}

/// Canonical dedup identity for a song: lowercase-trimmed `artist-title`.
pub fn normalized_key(artist: &str, title: &str) -> String {
    format!(
        "{}-{}",
        artist.trim().to_lowercase(),
        title.trim().to_lowercase()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_batch() {
        let json = r#"{
            "recommendations": [
                {
                    "title": "너의 의미",
                    "artist": "아이유",
                    "reason": "따뜻한 가사",
                    "lyric_style_summary": "담담하고 서정적인 어조",
                    "lyric_excerpt": "너의 그 한 마디 말도"
                }
            ]
        }"#;

        let batch = RecommendationBatch::parse(json).unwrap();
        assert_eq!(batch.recommendations.len(), 1);
        assert_eq!(batch.recommendations[0].artist, "아이유");
    }

    #[test]
    fn test_parse_missing_optional_fields() {
        let json = r#"{"recommendations": [{"title": "t", "artist": "a"}]}"#;
        let batch = RecommendationBatch::parse(json).unwrap();
        assert_eq!(batch.recommendations[0].reason, "");
        assert_eq!(batch.recommendations[0].lyric_excerpt, "");
    }

    #[test]
    fn test_parse_rejects_non_json() {
        assert!(RecommendationBatch::parse("I recommend five songs: ...").is_err());
    }

    #[test]
    fn test_parse_rejects_wrong_shape() {
        assert!(RecommendationBatch::parse(r#"{"songs": []}"#).is_err());
    }

    #[test]
    fn test_parse_rejects_empty_batch() {
        assert!(RecommendationBatch::parse(r#"{"recommendations": []}"#).is_err());
    }

    #[test]
    fn test_normalized_key_lowercases_and_trims() {
        assert_eq!(normalized_key(" IU ", "Blueming"), "iu-blueming");
        assert_eq!(normalized_key("아이유", "너의 의미"), "아이유-너의 의미");
    }
}
