//! DuckDuckGo HTML results provider. Needs no credentials.
//!
//! Result anchors carry the `result__a` class. Their `href` is usually a
//! DuckDuckGo redirect (`//duckduckgo.com/l/?uddg=<encoded target>`), which is
//! unwrapped to the target URL before filtering.

use super::serpapi::is_pdf;
use super::SearchProvider;
use crate::models::SearchCandidate;
use crate::utils::collapse_whitespace;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::Client;
use scraper::{Html, Selector};
use std::error::Error;
use tracing::{debug, instrument};
use url::Url;

/// DuckDuckGo's HTML endpoint never returns more than this many useful hits
/// above the fold.
const MAX_RESULTS: usize = 5;

static RESULT_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a.result__a").expect("valid result selector"));

/// Parse result anchors out of a DuckDuckGo HTML results page.
pub(crate) fn parse_results(html: &str, limit: usize) -> Vec<SearchCandidate> {
    let document = Html::parse_document(html);
    document
        .select(&RESULT_LINK)
        .filter_map(|el| {
            let title = collapse_whitespace(&el.text().collect::<String>());
            let url = unwrap_redirect(el.value().attr("href")?);
            Some((title, url))
        })
        .filter(|(title, url)| !title.is_empty() && url.starts_with("http") && !is_pdf(url))
        .take(limit.min(MAX_RESULTS))
        .map(|(title, url)| SearchCandidate::new(title, url))
        .collect()
}

/// Resolve `//duckduckgo.com/l/?uddg=...` to its target; other hrefs pass
/// through unchanged.
fn unwrap_redirect(href: &str) -> String {
    let absolute = if href.starts_with("//") {
        format!("https:{}", href)
    } else {
        href.to_string()
    };
    Url::parse(&absolute)
        .ok()
        .filter(|u| u.host_str().is_some_and(|h| h.ends_with("duckduckgo.com")) && u.path() == "/l/")
        .and_then(|u| {
            u.query_pairs()
                .find(|(k, _)| k == "uddg")
                .map(|(_, v)| v.into_owned())
        })
        .unwrap_or_else(|| href.to_string())
}

pub struct DuckDuckGo {
    client: Client,
    endpoint: String,
}

impl DuckDuckGo {
    pub fn new(client: Client, endpoint: &str) -> Self {
        Self {
            client,
            endpoint: endpoint.to_string(),
        }
    }
}

#[async_trait(?Send)]
impl SearchProvider for DuckDuckGo {
    fn name(&self) -> &'static str {
        "duckduckgo"
    }

    #[instrument(level = "debug", skip(self))]
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchCandidate>, Box<dyn Error>> {
        let url = format!("{}?q={}", self.endpoint, urlencoding::encode(query));
        let html = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let candidates = parse_results(&html, limit);
        debug!(count = candidates.len(), "DuckDuckGo candidates");
        Ok(candidates)
    }
}
