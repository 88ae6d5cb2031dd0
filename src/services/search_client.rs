//! Brave Search API client.
//!
//! All failure modes are absorbed here: missing credentials, non-success
//! status codes and malformed bodies log and return an empty result list so
//! the enrichment pipeline never blocks on a lookup.

use std::time::Duration;

use serde::Deserialize;

use crate::config::SearchConfig;

const SEARCH_BASE_URL: &str = "https://api.search.brave.com/res/v1/web/search";
const REQUEST_TIMEOUT_SECS: u64 = 15;

/// One web search hit
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    web: Option<WebResults>,
}

#[derive(Debug, Deserialize)]
struct WebResults {
    #[serde(default)]
    results: Vec<SearchResult>,
}

/// Best-effort search client
pub struct SearchClient {
    http: reqwest::Client,
    api_key: Option<String>,
}

impl SearchClient {
    pub fn new(config: &SearchConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http,
            api_key: config.api_key.clone(),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Run a web search, Korean-tagged. Never fails; an unconfigured or
    /// misbehaving provider yields an empty list.
    pub async fn search(&self, query: &str, count: u32) -> Vec<SearchResult> {
        let api_key = match &self.api_key {
            Some(key) => key,
            None => return Vec::new(),
        };

        let response = self
            .http
            .get(SEARCH_BASE_URL)
            .query(&[
                ("q", query),
                ("count", &count.to_string()),
                ("search_lang", "ko"),
            ])
            .header("Accept", "application/json")
            .header("Accept-Encoding", "gzip")
            .header("X-Subscription-Token", api_key)
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(query = %query, error = %e, "Search request failed");
                return Vec::new();
            }
        };

        if !response.status().is_success() {
            tracing::warn!(
                query = %query,
                status = response.status().as_u16(),
                "Search returned non-success status"
            );
            return Vec::new();
        }

        match response.json::<SearchResponse>().await {
            Ok(parsed) => parsed.web.map(|w| w.results).unwrap_or_default(),
            Err(e) => {
                tracing::warn!(query = %query, error = %e, "Malformed search response");
                Vec::new()
            }
        }
    }
}
