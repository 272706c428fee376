//! Pipeline settings and service credentials.
//!
//! Non-secret settings live in an optional YAML file deserialized into
//! [`PipelineConfig`]; every field has a default so a partial (or absent) file
//! is valid. Credentials never come from the file: they are read from the
//! CLI/environment into [`Credentials`], and a missing credential only disables
//! the provider or service that needs it.

use serde::Deserialize;
use std::error::Error;
use std::time::Duration;
use tracing::{info, instrument};

/// Where and how to crawl the listing site.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ListingConfig {
    /// Listing root, e.g. `https://beyondchats.com/blogs`. Page N lives at
    /// `{root_url}/page/{N}/`.
    pub root_url: String,
    /// Anchors scanned for pagination indices.
    pub pagination_selector: String,
    /// Anchors scanned for article detail links.
    pub article_link_selector: String,
    /// Resolved article URLs must start with this prefix. Defaults to
    /// `{root_url}/` when unset.
    pub article_url_prefix: Option<String>,
    /// How many of the oldest articles one ingest run collects.
    pub target_count: usize,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            root_url: "https://beyondchats.com/blogs".to_string(),
            pagination_selector: "a.page-numbers".to_string(),
            article_link_selector: "article a[href]".to_string(),
            article_url_prefix: None,
            target_count: 5,
        }
    }
}

impl ListingConfig {
    pub fn root(&self) -> &str {
        self.root_url.trim_end_matches('/')
    }

    pub fn article_prefix(&self) -> String {
        self.article_url_prefix
            .clone()
            .unwrap_or_else(|| format!("{}/", self.root()))
    }

    /// URL of listing page `page` (1-based). Page 1 is the root itself.
    pub fn page_url(&self, page: u32) -> String {
        if page <= 1 {
            self.root().to_string()
        } else {
            format!("{}/page/{}/", self.root(), page)
        }
    }
}

/// Competitor search and scrape settings.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SearchConfig {
    /// Competitors kept after scraping.
    pub competitor_count: usize,
    /// Candidates requested from each provider before trimming.
    pub provider_limit: usize,
    pub serpapi_url: String,
    pub google_cse_url: String,
    pub duckduckgo_url: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            competitor_count: 2,
            provider_limit: 5,
            serpapi_url: "https://serpapi.com/search".to_string(),
            google_cse_url: "https://www.googleapis.com/customsearch/v1".to_string(),
            duckduckgo_url: "https://html.duckduckgo.com/html/".to_string(),
        }
    }
}

/// Rewrite service settings.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct RewriteConfig {
    /// OpenAI-compatible chat completions endpoint.
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    /// Extra attempts after the first failed request. Zero means exactly one
    /// request per rewrite.
    pub retries: usize,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.groq.com/openai/v1/chat/completions".to_string(),
            model: "llama-3.3-70b-versatile".to_string(),
            temperature: 0.5,
            max_tokens: 4000,
            timeout_secs: 60,
            retries: 0,
        }
    }
}

/// HTTP behavior shared by every external fetch.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Pause between consecutive article fetches during ingest.
    pub article_delay_ms: u64,
    /// Pause between consecutive competitor scrapes.
    pub scrape_delay_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            article_delay_ms: 1000,
            scrape_delay_ms: 2000,
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn article_delay(&self) -> Duration {
        Duration::from_millis(self.article_delay_ms)
    }

    pub fn scrape_delay(&self) -> Duration {
        Duration::from_millis(self.scrape_delay_ms)
    }
}

/// Top-level pipeline configuration, usually loaded from `config.yaml`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Record store API base, e.g. `http://localhost:3000/api`.
    pub store_url: String,
    pub listing: ListingConfig,
    pub search: SearchConfig,
    pub rewrite: RewriteConfig,
    pub http: HttpConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            store_url: "http://localhost:3000/api".to_string(),
            listing: ListingConfig::default(),
            search: SearchConfig::default(),
            rewrite: RewriteConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn store_url(&self) -> &str {
        self.store_url.trim_end_matches('/')
    }
}

/// Credentials for the keyed search providers and the rewrite service.
#[derive(Clone, Default)]
pub struct Credentials {
    pub serpapi_key: Option<String>,
    pub google_search_api_key: Option<String>,
    pub google_search_engine_id: Option<String>,
    pub rewrite_api_key: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn redact(v: &Option<String>) -> Option<&'static str> {
            v.as_deref().map(|_| "<redacted>")
        }
        f.debug_struct("Credentials")
            .field("serpapi_key", &redact(&self.serpapi_key))
            .field("google_search_api_key", &redact(&self.google_search_api_key))
            .field("google_search_engine_id", &self.google_search_engine_id)
            .field("rewrite_api_key", &redact(&self.rewrite_api_key))
            .finish()
    }
}

impl Credentials {
    /// Treat empty strings (e.g. `SERPAPI_KEY=`) as unset.
    pub fn normalized(self) -> Self {
        fn keep(v: Option<String>) -> Option<String> {
            v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
        }
        Self {
            serpapi_key: keep(self.serpapi_key),
            google_search_api_key: keep(self.google_search_api_key),
            google_search_engine_id: keep(self.google_search_engine_id),
            rewrite_api_key: keep(self.rewrite_api_key),
        }
    }
}

/// Load pipeline settings from a YAML file, or defaults when no path is given.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not valid YAML for
/// [`PipelineConfig`].
#[instrument(level = "info")]
pub fn load_config(path: Option<&str>) -> Result<PipelineConfig, Box<dyn Error>> {
    let Some(path) = path else {
        info!("No config file given; using defaults");
        return Ok(PipelineConfig::default());
    };
    let raw = std::fs::read_to_string(path)?;
    let config: PipelineConfig = serde_yaml::from_str(&raw)?;
    info!(config_path = path, "Loaded configuration");
    Ok(config)
}
