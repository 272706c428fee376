//! SerpApi provider: Google organic results as JSON.
//!
//! `GET {endpoint}?api_key=..&q=..&engine=google&num=N&hl=en`

use super::SearchProvider;
use crate::models::SearchCandidate;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::error::Error;
use tracing::{debug, instrument};

#[derive(Debug, Deserialize)]
pub(crate) struct SerpApiResponse {
    #[serde(default)]
    organic_results: Vec<OrganicResult>,
    /// SerpApi reports quota and key problems in-band with a 200.
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OrganicResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
}

impl SerpApiResponse {
    pub(crate) fn into_candidates(self, limit: usize) -> Result<Vec<SearchCandidate>, Box<dyn Error>> {
        if let Some(error) = self.error {
            return Err(format!("SerpApi error: {}", error).into());
        }
        Ok(self
            .organic_results
            .into_iter()
            .take(limit)
            .filter(|r| !r.title.is_empty() && !r.link.is_empty() && !is_pdf(&r.link))
            .map(|r| SearchCandidate::new(r.title, r.link).with_snippet(r.snippet))
            .collect())
    }
}

/// Links ending in (or carrying) `.pdf` are not scrapeable articles.
pub(crate) fn is_pdf(url: &str) -> bool {
    url.to_ascii_lowercase().contains(".pdf")
}

pub struct SerpApi {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl SerpApi {
    pub fn new(client: Client, endpoint: &str, api_key: &str) -> Self {
        Self {
            client,
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait(?Send)]
impl SearchProvider for SerpApi {
    fn name(&self) -> &'static str {
        "serpapi"
    }

    #[instrument(level = "debug", skip(self))]
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchCandidate>, Box<dyn Error>> {
        let num = limit.to_string();
        let response: SerpApiResponse = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("q", query),
                ("engine", "google"),
                ("num", num.as_str()),
                ("hl", "en"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let candidates = response.into_candidates(limit)?;
        debug!(count = candidates.len(), "SerpApi candidates");
        Ok(candidates)
    }
}
