//! Google Programmable (Custom) Search JSON API provider.
//!
//! `GET {endpoint}?key=..&cx=..&q=..&num=N`. The API caps `num` at 10.

use super::serpapi::is_pdf;
use super::SearchProvider;
use crate::models::SearchCandidate;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::error::Error;
use tracing::{debug, instrument};

#[derive(Debug, Deserialize)]
pub(crate) struct CseResponse {
    #[serde(default)]
    items: Vec<CseItem>,
}

#[derive(Debug, Deserialize)]
struct CseItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
}

impl CseResponse {
    pub(crate) fn into_candidates(self, limit: usize) -> Vec<SearchCandidate> {
        self.items
            .into_iter()
            .filter(|i| !i.title.is_empty() && !i.link.is_empty() && !is_pdf(&i.link))
            .take(limit)
            .map(|i| SearchCandidate::new(i.title, i.link).with_snippet(i.snippet))
            .collect()
    }
}

pub struct GoogleCse {
    client: Client,
    endpoint: String,
    api_key: String,
    engine_id: String,
}

impl GoogleCse {
    pub fn new(client: Client, endpoint: &str, api_key: &str, engine_id: &str) -> Self {
        Self {
            client,
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
            engine_id: engine_id.to_string(),
        }
    }
}

#[async_trait(?Send)]
impl SearchProvider for GoogleCse {
    fn name(&self) -> &'static str {
        "google_cse"
    }

    #[instrument(level = "debug", skip(self))]
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchCandidate>, Box<dyn Error>> {
        let num = limit.clamp(1, 10).to_string();
        let response: CseResponse = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.engine_id.as_str()),
                ("q", query),
                ("num", num.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let candidates = response.into_candidates(limit);
        debug!(count = candidates.len(), "Google CSE candidates");
        Ok(candidates)
    }
}
