//! Competitor discovery: an ordered chain of search providers with silent
//! fallback, followed by scraping of the top candidates.
//!
//! # Provider order
//!
//! | # | Provider | Module | Requires |
//! |---|----------|--------|----------|
//! | 1 | SerpApi (Google results) | [`serpapi`] | `SERPAPI_KEY` |
//! | 2 | Google Custom Search | [`google_cse`] | `GOOGLE_SEARCH_API_KEY` + `GOOGLE_SEARCH_ENGINE_ID` |
//! | 3 | DuckDuckGo HTML results | [`duckduckgo`] | nothing |
//! | 4 | Static demo set | [`fallback`] | nothing |
//!
//! Providers without credentials are never constructed. The chain returns the
//! first non-empty provider result as-is; results are never merged across
//! providers. Any provider error or empty result is logged and the next
//! provider is tried, and when all of them come up empty the static set is
//! returned, so a search always yields at least one candidate.

pub mod duckduckgo;
pub mod fallback;
pub mod google_cse;
pub mod serpapi;

use crate::config::{Credentials, SearchConfig};
use crate::extract::{extract, ExtractionProfile};
use crate::http::PageFetcher;
use crate::models::{CompetitorArticle, SearchCandidate};
use async_trait::async_trait;
use reqwest::Client;
use std::error::Error;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

/// A search backend that turns a query into ranked candidates.
#[async_trait(?Send)]
pub trait SearchProvider {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Return up to `limit` candidates in rank order.
    async fn search(&self, query: &str, limit: usize)
        -> Result<Vec<SearchCandidate>, Box<dyn Error>>;
}

/// Ordered providers plus the static set used when all of them fail.
pub struct SearchChain {
    providers: Vec<Box<dyn SearchProvider>>,
    fallback: Vec<SearchCandidate>,
}

impl SearchChain {
    pub fn new(providers: Vec<Box<dyn SearchProvider>>, fallback: Vec<SearchCandidate>) -> Self {
        Self { providers, fallback }
    }

    /// Build the chain from configuration, skipping providers whose
    /// credentials are missing.
    pub fn from_config(config: &SearchConfig, creds: &Credentials, client: Client) -> Self {
        let mut providers: Vec<Box<dyn SearchProvider>> = Vec::new();

        if let Some(key) = &creds.serpapi_key {
            providers.push(Box::new(serpapi::SerpApi::new(
                client.clone(),
                &config.serpapi_url,
                key,
            )));
        }
        match (&creds.google_search_api_key, &creds.google_search_engine_id) {
            (Some(key), Some(cx)) => providers.push(Box::new(google_cse::GoogleCse::new(
                client.clone(),
                &config.google_cse_url,
                key,
                cx,
            ))),
            (Some(_), None) | (None, Some(_)) => {
                warn!("Google Custom Search needs both an API key and an engine id; skipping")
            }
            (None, None) => {}
        }
        providers.push(Box::new(duckduckgo::DuckDuckGo::new(
            client,
            &config.duckduckgo_url,
        )));

        let chain = Self::new(providers, fallback::demo_candidates());
        info!(providers = ?chain.provider_names(), "Search chain configured");
        chain
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Search each provider in order and return the first non-empty result,
    /// truncated to `limit`. Falls back to the static set, so the result is
    /// never empty when `limit > 0`.
    #[instrument(level = "info", skip(self))]
    pub async fn search(&self, query: &str, limit: usize) -> Vec<SearchCandidate> {
        for provider in &self.providers {
            let t0 = Instant::now();
            match provider.search(query, limit).await {
                Ok(mut candidates) if !candidates.is_empty() => {
                    candidates.truncate(limit);
                    info!(
                        provider = provider.name(),
                        count = candidates.len(),
                        elapsed_ms = t0.elapsed().as_millis() as u64,
                        "Search provider returned results"
                    );
                    return candidates;
                }
                Ok(_) => {
                    info!(provider = provider.name(), "Search provider returned no results; trying next");
                }
                Err(e) => {
                    warn!(provider = provider.name(), error = %e, "Search provider failed; trying next");
                }
            }
        }

        warn!("Every search provider came up empty; using static fallback set");
        self.fallback.iter().take(limit).cloned().collect()
    }
}

/// Search for `query` and scrape the top `count` candidates into competitor
/// articles.
///
/// Candidates that already carry content are used as-is. The rest are fetched
/// and extracted with [`ExtractionProfile::competitor`], pausing `delay`
/// between consecutive scrapes. A candidate whose scrape fails or yields no
/// text is dropped. The result keeps provider rank and never exceeds `count`.
#[instrument(level = "info", skip(chain, fetcher))]
pub async fn find_competitors(
    chain: &SearchChain,
    fetcher: &dyn PageFetcher,
    query: &str,
    count: usize,
    provider_limit: usize,
    delay: Duration,
) -> Vec<CompetitorArticle> {
    let candidates = chain.search(query, provider_limit.max(count)).await;
    let profile = ExtractionProfile::competitor();

    let mut competitors = Vec::with_capacity(count);
    let mut scrapes = 0usize;
    for candidate in candidates.into_iter().take(count) {
        if let Some(content) = candidate.content {
            debug!(url = %candidate.url, "Using pre-supplied candidate content");
            competitors.push(CompetitorArticle {
                title: candidate.title,
                body: content,
                url: candidate.url,
            });
            continue;
        }

        debug!(
            url = %candidate.url,
            snippet = candidate.snippet.as_deref().unwrap_or(""),
            "Scraping competitor candidate"
        );
        if scrapes > 0 && !delay.is_zero() {
            sleep(delay).await;
        }
        scrapes += 1;

        match fetcher.fetch_html(&candidate.url).await {
            Ok(html) => {
                let extracted = extract(&html, &candidate.url, &profile);
                if extracted.body.is_empty() {
                    warn!(url = %candidate.url, "Competitor page had no usable text; dropping");
                    continue;
                }
                info!(url = %candidate.url, title = %extracted.title, chars = extracted.body.len(), "Scraped competitor");
                competitors.push(CompetitorArticle {
                    title: extracted.title,
                    body: extracted.body,
                    url: candidate.url,
                });
            }
            Err(e) => {
                warn!(url = %candidate.url, error = %e, "Competitor scrape failed; dropping");
            }
        }
    }

    info!(count = competitors.len(), "Competitor articles ready");
    competitors
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::cell::Cell;

    /// Provider with a scripted outcome that counts how often it was called.
    pub struct ScriptedProvider {
        pub name: &'static str,
        pub outcome: Result<Vec<SearchCandidate>, String>,
        pub calls: Cell<usize>,
    }

    impl ScriptedProvider {
        pub fn ok(name: &'static str, urls: &[&str]) -> Self {
            Self {
                name,
                outcome: Ok(urls
                    .iter()
                    .map(|u| SearchCandidate::new(format!("{} result", name), *u))
                    .collect()),
                calls: Cell::new(0),
            }
        }

        pub fn failing(name: &'static str) -> Self {
            Self {
                name,
                outcome: Err(format!("{} is down", name)),
                calls: Cell::new(0),
            }
        }
    }

    #[async_trait(?Send)]
    impl SearchProvider for std::rc::Rc<ScriptedProvider> {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn search(
            &self,
            _query: &str,
            _limit: usize,
        ) -> Result<Vec<SearchCandidate>, Box<dyn Error>> {
            self.calls.set(self.calls.get() + 1);
            self.outcome.clone().map_err(|e| e.into())
        }
    }
}
