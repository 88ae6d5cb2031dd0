//! Configuration for the gasa service.
//!
//! Two-tier resolution: an optional TOML file provides the base values and
//! `GASA_*` environment variables override it. External credentials (LLM,
//! search provider) are optional; when absent the dependent lookups degrade
//! rather than block startup.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{info, warn};

/// Top-level service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// HTTP listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// SQLite database file path
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Text-generation provider
    #[serde(default)]
    pub llm: LlmConfig,

    /// Web search provider (lyric / video enrichment)
    #[serde(default)]
    pub search: SearchConfig,
}

/// Chat-completions provider configuration (OpenAI-compatible)
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    /// API key; recommendation rounds fail while unset
    pub api_key: Option<String>,

    /// Base URL of the chat-completions API
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// Model identifier
    #[serde(default = "default_llm_model")]
    pub model: String,
}

/// Web search provider configuration (Brave Search API)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchConfig {
    /// Subscription token; lookups return no result while unset
    pub api_key: Option<String>,
}

fn default_port() -> u16 {
    5780
}

fn default_database_path() -> PathBuf {
    PathBuf::from("gasa.db")
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_llm_model() -> String {
    "gpt-5.2".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            database_path: default_database_path(),
            llm: LlmConfig::default(),
            search: SearchConfig::default(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_llm_base_url(),
            model: default_llm_model(),
        }
    }
}

impl Config {
    /// Load configuration from an optional TOML file, then apply environment
    /// overrides. A missing explicit path is an error; a missing default path
    /// just falls back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => {
                let content = std::fs::read_to_string(p)
                    .with_context(|| format!("Failed to read config file: {}", p.display()))?;
                let config: Config = toml::from_str(&content)
                    .with_context(|| format!("Failed to parse config file: {}", p.display()))?;
                info!("Loaded configuration from {}", p.display());
                config
            }
            None => {
                let default_path = Path::new("gasa.toml");
                if default_path.exists() {
                    let content = std::fs::read_to_string(default_path)
                        .context("Failed to read gasa.toml")?;
                    let config: Config =
                        toml::from_str(&content).context("Failed to parse gasa.toml")?;
                    info!("Loaded configuration from gasa.toml");
                    config
                } else {
                    Config::default()
                }
            }
        };

        config.apply_env();
        config.log_credential_state();
        Ok(config)
    }

    /// Environment overrides (highest priority)
    fn apply_env(&mut self) {
        if let Ok(port) = std::env::var("GASA_PORT") {
            match port.parse() {
                Ok(p) => self.port = p,
                Err(_) => warn!("Ignoring invalid GASA_PORT value: {}", port),
            }
        }
        if let Ok(path) = std::env::var("GASA_DATABASE_PATH") {
            self.database_path = PathBuf::from(path);
        }
        if let Ok(key) = std::env::var("GASA_LLM_API_KEY") {
            if !key.trim().is_empty() {
                self.llm.api_key = Some(key);
            }
        }
        if let Ok(url) = std::env::var("GASA_LLM_BASE_URL") {
            if !url.trim().is_empty() {
                self.llm.base_url = url;
            }
        }
        if let Ok(model) = std::env::var("GASA_LLM_MODEL") {
            if !model.trim().is_empty() {
                self.llm.model = model;
            }
        }
        if let Ok(key) = std::env::var("GASA_SEARCH_API_KEY") {
            if !key.trim().is_empty() {
                self.search.api_key = Some(key);
            }
        }
    }

    fn log_credential_state(&self) {
        if self.llm.api_key.is_some() {
            info!("LLM provider configured (model: {})", self.llm.model);
        } else {
            warn!(
                "LLM API key not configured - recommendation rounds will fail until one is \
                 provided (GASA_LLM_API_KEY or [llm] api_key in gasa.toml)"
            );
        }
        if self.search.api_key.is_some() {
            info!("Search provider configured");
        } else {
            warn!("Search API key not configured - lyric/video enrichment disabled");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.port, 5780);
        assert_eq!(config.database_path, PathBuf::from("gasa.db"));
        assert!(config.llm.api_key.is_none());
        assert_eq!(config.llm.base_url, "https://api.openai.com/v1");
        assert!(config.search.api_key.is_none());
    }

    #[test]
    fn test_parse_full_toml() {
        let toml = r#"
            port = 8080
            database_path = "/tmp/test.db"

            [llm]
            api_key = "sk-test"
            base_url = "http://localhost:11434/v1"
            model = "test-model"

            [search]
            api_key = "brave-test"
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.database_path, PathBuf::from("/tmp/test.db"));
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.llm.base_url, "http://localhost:11434/v1");
        assert_eq!(config.llm.model, "test-model");
        assert_eq!(config.search.api_key.as_deref(), Some("brave-test"));
    }

    #[test]
    fn test_parse_partial_toml_uses_defaults() {
        let toml = r#"
            [llm]
            api_key = "sk-test"
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.port, 5780);
        assert_eq!(config.llm.model, "gpt-5.2");
        assert!(config.search.api_key.is_none());
    }
}
