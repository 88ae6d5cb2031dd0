//! External enrichment gateway.
//!
//! Two independent best-effort lookups per candidate: a lyric-source URL
//! (scored against a fixed table of known lyric-hosting domains) and a
//! YouTube watch URL. Both resolve to `None` rather than erroring when the
//! provider is unconfigured, unreachable or returns nothing usable.

use super::search_client::{SearchClient, SearchResult};

/// Known lyric-hosting domains, highest priority first. First substring
/// match wins; the priority is the score contribution.
const LYRIC_DOMAIN_PRIORITIES: &[(&str, i32)] = &[
    ("bugs.co.kr", 10),
    ("melon.com", 8),
    ("genie.co.kr", 7),
    ("music.naver.com", 6),
    ("genius.com", 5),
    ("azlyrics.com", 4),
];

const RESULT_COUNT: u32 = 5;

pub struct EnrichmentGateway {
    search: SearchClient,
}

impl EnrichmentGateway {
    pub fn new(search: SearchClient) -> Self {
        Self { search }
    }

    /// Resolve both enrichment URLs concurrently.
    pub async fn enrich(&self, artist: &str, title: &str) -> (Option<String>, Option<String>) {
        tokio::join!(
            self.find_lyric_url(artist, title),
            self.find_video_url(artist, title),
        )
    }

    /// Best lyric-source URL, trying a Korean query before an English one.
    pub async fn find_lyric_url(&self, artist: &str, title: &str) -> Option<String> {
        let queries = [
            format!("{} {} 가사", artist, title),
            format!("{} {} lyrics", artist, title),
        ];

        for query in &queries {
            let results = self.search.search(query, RESULT_COUNT).await;
            if let Some(url) = pick_lyric_url(&results) {
                return Some(url);
            }
        }

        None
    }

    /// First YouTube watch URL, retrying once with a looser query.
    pub async fn find_video_url(&self, artist: &str, title: &str) -> Option<String> {
        let query = format!("{} {} official MV site:youtube.com", artist, title);
        let results = self.search.search(&query, RESULT_COUNT).await;
        if let Some(url) = pick_video_url(&results) {
            return Some(url);
        }

        let fallback = format!("{} {} site:youtube.com", artist, title);
        let results = self.search.search(&fallback, RESULT_COUNT).await;
        pick_video_url(&results)
    }
}

/// Highest-scoring result URL, first result winning ties. Any non-empty
/// result set yields a URL, even at score zero.
fn pick_lyric_url(results: &[SearchResult]) -> Option<String> {
    let mut best: Option<(&SearchResult, i32)> = None;
    for result in results {
        let score = score_lyric_result(result);
        if best.map_or(true, |(_, top)| score > top) {
            best = Some((result, score));
        }
    }
    best.map(|(result, _)| result.url.clone())
}

fn score_lyric_result(result: &SearchResult) -> i32 {
    let mut score = 0;
    for (domain, priority) in LYRIC_DOMAIN_PRIORITIES {
        if result.url.contains(domain) {
            score += priority;
            break;
        }
    }
    if result.title.contains("가사") || result.description.contains("가사") {
        score += 3;
    }
    if result.title.contains("lyrics") || result.description.contains("lyrics") {
        score += 2;
    }
    score
}

fn pick_video_url(results: &[SearchResult]) -> Option<String> {
    results
        .iter()
        .find(|r| r.url.contains("youtube.com/watch"))
        .map(|r| r.url.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(title: &str, url: &str, description: &str) -> SearchResult {
        SearchResult {
            title: title.to_string(),
            url: url.to_string(),
            description: description.to_string(),
        }
    }

    #[test]
    fn test_score_prefers_priority_domains() {
        let bugs = result("노래", "https://music.bugs.co.kr/track/1", "");
        let genius = result("song", "https://genius.com/song", "");
        assert_eq!(score_lyric_result(&bugs), 10);
        assert_eq!(score_lyric_result(&genius), 5);
    }

    #[test]
    fn test_score_adds_lyric_keyword_weight() {
        let korean = result("너의 의미 가사", "https://melon.com/1", "");
        assert_eq!(score_lyric_result(&korean), 8 + 3);

        let english = result("", "https://example.com", "full lyrics here");
        assert_eq!(score_lyric_result(&english), 2);

        let both = result("가사 lyrics", "https://example.com", "");
        assert_eq!(score_lyric_result(&both), 5);
    }

    #[test]
    fn test_score_counts_only_first_domain_match() {
        // A URL mentioning two known domains only scores the higher one
        let r = result("", "https://music.bugs.co.kr/?from=melon.com", "");
        assert_eq!(score_lyric_result(&r), 10);
    }

    #[test]
    fn test_pick_lyric_url_takes_best_score() {
        let results = vec![
            result("song", "https://example.com/a", ""),
            result("가사", "https://genie.co.kr/b", ""),
            result("", "https://example.com/c", ""),
        ];
        assert_eq!(
            pick_lyric_url(&results),
            Some("https://genie.co.kr/b".to_string())
        );
    }

    #[test]
    fn test_pick_lyric_url_accepts_score_zero() {
        let results = vec![result("whatever", "https://example.com/a", "")];
        assert_eq!(pick_lyric_url(&results), Some("https://example.com/a".to_string()));
    }

    #[test]
    fn test_pick_lyric_url_ties_resolve_to_first() {
        // Equal scores keep search-ranking order
        let results = vec![
            result("너의 의미 가사", "https://melon.com/a", ""),
            result("너의 의미 가사", "https://melon.com/b", ""),
        ];
        assert_eq!(pick_lyric_url(&results), Some("https://melon.com/a".to_string()));

        let zeros = vec![
            result("", "https://example.com/first", ""),
            result("", "https://example.com/second", ""),
        ];
        assert_eq!(
            pick_lyric_url(&zeros),
            Some("https://example.com/first".to_string())
        );
    }

    #[test]
    fn test_pick_lyric_url_empty_results() {
        assert_eq!(pick_lyric_url(&[]), None);
    }

    #[test]
    fn test_pick_video_url_filters_watch_pages() {
        let results = vec![
            result("channel", "https://youtube.com/@artist", ""),
            result("mv", "https://www.youtube.com/watch?v=abc123", ""),
            result("mv2", "https://www.youtube.com/watch?v=def456", ""),
        ];
        assert_eq!(
            pick_video_url(&results),
            Some("https://www.youtube.com/watch?v=abc123".to_string())
        );
    }

    #[test]
    fn test_pick_video_url_no_watch_pages() {
        let results = vec![result("channel", "https://youtube.com/@artist", "")];
        assert_eq!(pick_video_url(&results), None);
    }

    #[tokio::test]
    async fn test_unconfigured_gateway_yields_no_results() {
        let search = SearchClient::new(&crate::config::SearchConfig { api_key: None }).unwrap();
        let gateway = EnrichmentGateway::new(search);

        let (lyric, video) = gateway.enrich("아이유", "너의 의미").await;
        assert!(lyric.is_none());
        assert!(video.is_none());
    }
}
